use crate::config::Config;
use crate::datasource::{LedgerSource, MarketData};
use crate::domain::{Address, PoolId};
use crate::engine::{classify_all, AggregationError, Aggregator, HistoricalPriceResolver, Report};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// The single user-visible result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Report(Report),
    /// Empty history or an unpriceable asset; no figures were computed.
    ProcessFailed { reason: String },
    /// A collaborator failed mid-run; carries the underlying cause.
    Error { cause: String },
}

impl RunOutcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            RunOutcome::Report(report) => Some(report),
            _ => None,
        }
    }
}

impl From<Result<Report, AggregationError>> for RunOutcome {
    fn from(result: Result<Report, AggregationError>) -> Self {
        match result {
            Ok(report) => RunOutcome::Report(report),
            Err(e) if e.is_precondition() => RunOutcome::ProcessFailed {
                reason: e.to_string(),
            },
            Err(e) => RunOutcome::Error {
                cause: e.to_string(),
            },
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Report(report) => write!(f, "{}", report),
            RunOutcome::ProcessFailed { .. } => write!(f, "Error in the process"),
            RunOutcome::Error { cause } => write!(f, "Run failed: {}", cause),
        }
    }
}

/// Settings the runner takes from [`Config`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub quote_mint: Address,
    pub native_mint: Address,
    pub native_pool_id: Option<PoolId>,
    pub price_lookup_concurrency: usize,
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            quote_mint: config.quote_mint.clone(),
            native_mint: config.native_mint.clone(),
            native_pool_id: config.native_pool_id.clone(),
            price_lookup_concurrency: config.price_lookup_concurrency,
        }
    }
}

/// Runs one wallet/token reconstruction end to end.
#[derive(Debug, Clone)]
pub struct PnlRunner {
    ledger: Arc<dyn LedgerSource>,
    market: Arc<dyn MarketData>,
    settings: RunSettings,
}

impl PnlRunner {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        market: Arc<dyn MarketData>,
        settings: RunSettings,
    ) -> Self {
        Self {
            ledger,
            market,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub async fn run(&self, wallet: &Address, token: &Address) -> RunOutcome {
        info!("Reconstructing position of {} for wallet {}", token, wallet);
        let outcome = RunOutcome::from(self.try_run(wallet, token).await);
        match &outcome {
            RunOutcome::Report(report) => info!(
                "Run complete: {} transfers, {} fallbacks, unrealized PnL {}",
                report.transfer_count,
                report.fallbacks.len(),
                report.unrealized_pnl
            ),
            RunOutcome::ProcessFailed { reason } => warn!("Run produced no report: {}", reason),
            RunOutcome::Error { cause } => warn!("Run aborted: {}", cause),
        }
        outcome
    }

    async fn try_run(&self, wallet: &Address, token: &Address) -> Result<Report, AggregationError> {
        let (history, current_token, current_native) = tokio::try_join!(
            self.ledger.fetch_transfers(wallet, token),
            self.market.current_price(token),
            self.market.current_price(&self.settings.native_mint),
        )?;

        let transfers = match &history.token_account {
            Some(account) => classify_all(&history.transfers, account),
            None => Vec::new(),
        };

        let native_pool = self
            .settings
            .native_pool_id
            .clone()
            .or_else(|| current_native.pool_id.clone());
        let resolver = HistoricalPriceResolver::new(
            self.market.clone(),
            self.settings.quote_mint.clone(),
            self.settings.native_mint.clone(),
            native_pool,
        );
        let aggregator = Aggregator::new(resolver, self.settings.price_lookup_concurrency);

        aggregator
            .aggregate(token, &transfers, &current_token, &current_native)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSourceError;
    use crate::engine::{PositionState, PricedAsset};
    use crate::domain::Decimal;

    #[test]
    fn test_outcome_from_precondition_failures() {
        let outcome = RunOutcome::from(Err(AggregationError::NoActivity));
        assert!(matches!(outcome, RunOutcome::ProcessFailed { .. }));
        assert_eq!(outcome.to_string(), "Error in the process");

        let outcome = RunOutcome::from(Err(AggregationError::Unpriceable(PricedAsset::Token)));
        assert!(matches!(outcome, RunOutcome::ProcessFailed { .. }));
    }

    #[test]
    fn test_outcome_from_collaborator_error_keeps_cause() {
        let outcome = RunOutcome::from(Err(AggregationError::Collaborator(
            DataSourceError::NetworkError("connection reset".to_string()),
        )));
        match &outcome {
            RunOutcome::Error { cause } => assert!(cause.contains("connection reset")),
            other => panic!("Expected Error outcome, got {:?}", other),
        }
        assert!(outcome.report().is_none());
    }

    #[test]
    fn test_outcome_from_overflow_is_error() {
        let outcome = RunOutcome::from(Err(AggregationError::Overflow));
        assert!(matches!(outcome, RunOutcome::Error { .. }));
    }

    #[test]
    fn test_outcome_from_report() {
        let report = PositionState::new()
            .finalize(Decimal::one(), Vec::new())
            .unwrap();
        let outcome = RunOutcome::from(Ok(report.clone()));
        assert_eq!(outcome.report(), Some(&report));
    }
}
