use super::fees;
use super::price_resolver::HistoricalPriceResolver;
use crate::datasource::DataSourceError;
use crate::domain::{Address, Decimal, PoolId, PriceLookup, PriceQuote, Side, Slot, TokenTransfer};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Running totals for one run. Created empty, folded once per transfer,
/// finalized into a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionState {
    pub total_bought: Decimal,
    pub total_sold: Decimal,
    /// Signed: buys add `amount * price`, sells subtract it.
    pub cost_basis: Decimal,
    pub total_fees_quote: Decimal,
    pub transfer_count: usize,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one transfer priced at its historical prices.
    ///
    /// On overflow the state is left unchanged.
    pub fn apply(
        &mut self,
        transfer: &TokenTransfer,
        token_price: Decimal,
        native_price: Decimal,
    ) -> Result<(), AggregationError> {
        let notional = transfer
            .amount
            .checked_mul(token_price)
            .ok_or(AggregationError::Overflow)?;
        let fee = fees::to_quote(transfer.network_fee, native_price)
            .ok_or(AggregationError::Overflow)?;
        let total_fees_quote = self
            .total_fees_quote
            .checked_add(fee)
            .ok_or(AggregationError::Overflow)?;

        let (total_bought, total_sold, cost_basis) = match transfer.direction {
            Side::Buy => (
                self.total_bought.checked_add(transfer.amount),
                Some(self.total_sold),
                self.cost_basis.checked_add(notional),
            ),
            Side::Sell => (
                Some(self.total_bought),
                self.total_sold.checked_add(transfer.amount),
                self.cost_basis.checked_sub(notional),
            ),
        };

        self.total_bought = total_bought.ok_or(AggregationError::Overflow)?;
        self.total_sold = total_sold.ok_or(AggregationError::Overflow)?;
        self.cost_basis = cost_basis.ok_or(AggregationError::Overflow)?;
        self.total_fees_quote = total_fees_quote;
        self.transfer_count += 1;
        Ok(())
    }

    /// Net quantity; negative when sells exceed buys.
    pub fn held_quantity(&self) -> Decimal {
        self.total_bought - self.total_sold
    }

    pub fn finalize(
        self,
        current_token_price: Decimal,
        fallbacks: Vec<FallbackNotice>,
    ) -> Result<Report, AggregationError> {
        let held_quantity = self.held_quantity();
        let current_value = held_quantity
            .checked_mul(current_token_price)
            .ok_or(AggregationError::Overflow)?;
        let unrealized_pnl = current_value
            .checked_sub(self.cost_basis)
            .and_then(|v| v.checked_sub(self.total_fees_quote))
            .ok_or(AggregationError::Overflow)?;
        Ok(Report {
            held_quantity,
            cost_basis: self.cost_basis,
            current_value,
            unrealized_pnl,
            total_bought: self.total_bought,
            total_sold: self.total_sold,
            total_fees_quote: self.total_fees_quote,
            current_token_price,
            transfer_count: self.transfer_count,
            fallbacks,
        })
    }
}

/// Which price a fallback substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PricedAsset {
    Token,
    Native,
}

impl fmt::Display for PricedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricedAsset::Token => write!(f, "token"),
            PricedAsset::Native => write!(f, "native"),
        }
    }
}

/// A historical price was unavailable and the current price was used instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackNotice {
    pub slot: Slot,
    pub asset: PricedAsset,
    pub substituted_price: Decimal,
}

impl fmt::Display for FallbackNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "historical {} price unavailable at slot {}, using current price {}",
            self.asset, self.slot, self.substituted_price
        )
    }
}

/// Final figures of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub held_quantity: Decimal,
    pub cost_basis: Decimal,
    pub current_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_bought: Decimal,
    pub total_sold: Decimal,
    pub total_fees_quote: Decimal,
    pub current_token_price: Decimal,
    pub transfer_count: usize,
    pub fallbacks: Vec<FallbackNotice>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total tokens held: {}", self.held_quantity)?;
        writeln!(f, "Total purchase amount (cost basis): {}", self.cost_basis)?;
        writeln!(f, "Current value of holdings: {}", self.current_value)?;
        write!(f, "Unrealized PnL: {}", self.unrealized_pnl)
    }
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("no transfer activity for this wallet and token")]
    NoActivity,
    #[error("no current price for the {0} asset")]
    Unpriceable(PricedAsset),
    #[error("position arithmetic overflowed")]
    Overflow,
    #[error(transparent)]
    Collaborator(#[from] DataSourceError),
}

impl AggregationError {
    /// Precondition failures end the run without a report but carry no cause.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AggregationError::NoActivity | AggregationError::Unpriceable(_)
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedPrices {
    token: PriceLookup,
    native: PriceLookup,
}

/// Folds classified transfers into a position and unrealized PnL.
#[derive(Debug, Clone)]
pub struct Aggregator {
    resolver: HistoricalPriceResolver,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(resolver: HistoricalPriceResolver, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Reconstruct the position of `token` from `transfers`.
    ///
    /// Historical prices for all transfers are resolved concurrently (bounded
    /// by `concurrency`), then folded in input order by a single owner.
    ///
    /// The current native price is only required when some historical native
    /// lookup is unavailable.
    pub async fn aggregate(
        &self,
        token: &Address,
        transfers: &[TokenTransfer],
        current_token: &PriceQuote,
        current_native: &PriceQuote,
    ) -> Result<Report, AggregationError> {
        if transfers.is_empty() {
            return Err(AggregationError::NoActivity);
        }
        let current_token_price = current_token
            .price
            .price()
            .ok_or(AggregationError::Unpriceable(PricedAsset::Token))?;
        let current_native_price = current_native.price.price();

        let token_pool = current_token.pool_id.as_ref();
        let slots: Vec<Slot> = transfers.iter().map(|t| t.slot).collect();
        let resolved: Vec<ResolvedPrices> = stream::iter(slots)
            .map(|slot| self.resolve_transfer(token, slot, token_pool))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut state = PositionState::new();
        let mut fallbacks = Vec::new();
        for (transfer, prices) in transfers.iter().zip(resolved) {
            let token_price = with_fallback(
                prices.token,
                Some(current_token_price),
                transfer.slot,
                PricedAsset::Token,
                &mut fallbacks,
            )?;
            let native_price = with_fallback(
                prices.native,
                current_native_price,
                transfer.slot,
                PricedAsset::Native,
                &mut fallbacks,
            )?;
            state.apply(transfer, token_price, native_price)?;
        }

        debug!(
            "Folded {} transfers with {} fallbacks",
            state.transfer_count,
            fallbacks.len()
        );
        state.finalize(current_token_price, fallbacks)
    }

    async fn resolve_transfer(
        &self,
        token: &Address,
        slot: Slot,
        token_pool: Option<&PoolId>,
    ) -> Result<ResolvedPrices, DataSourceError> {
        let (token_price, native_price) = futures::try_join!(
            self.resolver.resolve(token, slot, token_pool),
            self.resolver.resolve_native(slot),
        )?;
        Ok(ResolvedPrices {
            token: token_price,
            native: native_price,
        })
    }
}

/// Use the historical price, or the current one with a notice.
fn with_fallback(
    lookup: PriceLookup,
    current: Option<Decimal>,
    slot: Slot,
    asset: PricedAsset,
    notices: &mut Vec<FallbackNotice>,
) -> Result<Decimal, AggregationError> {
    match lookup {
        PriceLookup::Priced(price) => Ok(price),
        PriceLookup::Unavailable => {
            let current = current.ok_or(AggregationError::Unpriceable(asset))?;
            let notice = FallbackNotice {
                slot,
                asset,
                substituted_price: current,
            };
            warn!("{}", notice);
            notices.push(notice);
            Ok(current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockMarketData;
    use std::sync::Arc;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn transfer(direction: Side, amount: &str, slot: u64, fee: &str) -> TokenTransfer {
        TokenTransfer::new(
            format!("sig{}", slot),
            d(amount),
            direction,
            Slot::new(slot),
            d(fee),
            None,
        )
    }

    fn addr(byte: u8) -> Address {
        Address::from_bytes(&[byte; 32])
    }

    #[test]
    fn test_position_state_buy_and_sell() {
        let mut state = PositionState::new();
        state
            .apply(&transfer(Side::Buy, "10", 1, "0.001"), d("1"), d("5"))
            .unwrap();
        state
            .apply(&transfer(Side::Sell, "5", 2, "0.001"), d("2"), d("2"))
            .unwrap();

        assert_eq!(state.total_bought, d("10"));
        assert_eq!(state.total_sold, d("5"));
        assert_eq!(state.held_quantity(), d("5"));
        assert_eq!(state.cost_basis, d("0"));
        assert_eq!(state.total_fees_quote, d("0.007"));
        assert_eq!(state.transfer_count, 2);
    }

    #[test]
    fn test_sell_reduces_cost_basis_below_zero() {
        let mut state = PositionState::new();
        state
            .apply(&transfer(Side::Buy, "1", 1, "0"), d("1"), d("1"))
            .unwrap();
        state
            .apply(&transfer(Side::Sell, "1", 2, "0"), d("10"), d("1"))
            .unwrap();
        assert_eq!(state.cost_basis, d("-9"));
    }

    #[test]
    fn test_held_quantity_not_clamped() {
        let mut state = PositionState::new();
        state
            .apply(&transfer(Side::Sell, "3", 1, "0"), d("1"), d("1"))
            .unwrap();
        assert_eq!(state.held_quantity(), d("-3"));
    }

    #[test]
    fn test_apply_overflow_leaves_state_unchanged() {
        let mut state = PositionState::new();
        state
            .apply(&transfer(Side::Buy, "1", 1, "0"), d("2"), d("1"))
            .unwrap();
        let before = state.clone();

        let result = state.apply(&transfer(Side::Buy, "10", 2, "0"), d("1e28"), d("1"));
        assert!(matches!(result, Err(AggregationError::Overflow)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_fee_overflow_is_error() {
        let mut state = PositionState::new();
        let result = state.apply(&transfer(Side::Buy, "1", 1, "1000"), d("1"), d("1e27"));
        assert!(matches!(result, Err(AggregationError::Overflow)));
    }

    #[test]
    fn test_finalize_overflow_is_error() {
        let mut state = PositionState::new();
        state
            .apply(&transfer(Side::Buy, "100", 1, "0"), d("1"), d("1"))
            .unwrap();
        assert!(matches!(
            state.finalize(d("1e27"), Vec::new()),
            Err(AggregationError::Overflow)
        ));
    }

    #[test]
    fn test_finalize_derivations() {
        let mut state = PositionState::new();
        state
            .apply(&transfer(Side::Buy, "10", 1, "0.001"), d("1"), d("5"))
            .unwrap();
        state
            .apply(&transfer(Side::Sell, "5", 2, "0.001"), d("2"), d("2"))
            .unwrap();
        let report = state.finalize(d("2"), Vec::new()).unwrap();

        assert_eq!(report.current_value, d("10"));
        assert_eq!(report.unrealized_pnl, d("9.993"));
    }

    #[test]
    fn test_report_display_order() {
        let report = PositionState::new().finalize(d("2"), Vec::new()).unwrap();
        let lines: Vec<String> = report.to_string().lines().map(String::from).collect();
        assert_eq!(
            lines,
            vec![
                "Total tokens held: 0",
                "Total purchase amount (cost basis): 0",
                "Current value of holdings: 0",
                "Unrealized PnL: 0",
            ]
        );
    }

    #[test]
    fn test_fallback_notice_display() {
        let notice = FallbackNotice {
            slot: Slot::new(42),
            asset: PricedAsset::Native,
            substituted_price: d("150"),
        };
        assert_eq!(
            notice.to_string(),
            "historical native price unavailable at slot 42, using current price 150"
        );
    }

    #[test]
    fn test_with_fallback_records_notice_only_when_unavailable() {
        let mut notices = Vec::new();
        let price = with_fallback(
            PriceLookup::Priced(d("1")),
            Some(d("2")),
            Slot::new(1),
            PricedAsset::Token,
            &mut notices,
        )
        .unwrap();
        assert_eq!(price, d("1"));
        assert!(notices.is_empty());

        let price = with_fallback(
            PriceLookup::Unavailable,
            Some(d("2")),
            Slot::new(2),
            PricedAsset::Token,
            &mut notices,
        )
        .unwrap();
        assert_eq!(price, d("2"));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].slot, Slot::new(2));
    }

    #[test]
    fn test_with_fallback_without_current_price() {
        let mut notices = Vec::new();
        let price = with_fallback(
            PriceLookup::Priced(d("5")),
            None,
            Slot::new(1),
            PricedAsset::Native,
            &mut notices,
        )
        .unwrap();
        assert_eq!(price, d("5"));

        let result = with_fallback(
            PriceLookup::Unavailable,
            None,
            Slot::new(2),
            PricedAsset::Native,
            &mut notices,
        );
        assert!(matches!(
            result,
            Err(AggregationError::Unpriceable(PricedAsset::Native))
        ));
        assert!(notices.is_empty());
    }

    #[test]
    fn test_overflow_is_not_a_precondition() {
        assert!(!AggregationError::Overflow.is_precondition());
        assert!(AggregationError::NoActivity.is_precondition());
    }

    #[tokio::test]
    async fn test_aggregate_needs_native_quote_only_for_fallback() {
        let (token, native, quote) = (addr(1), addr(2), addr(3));
        let pool = PoolId::new("native-pool".to_string());
        let market = MockMarketData::new()
            .with_historical_price(token.clone(), Slot::new(1), d("1"))
            .with_historical_price(native.clone(), Slot::new(1), d("5"));
        let resolver = HistoricalPriceResolver::new(Arc::new(market), quote, native, Some(pool));
        let aggregator = Aggregator::new(resolver, 2);
        let current_token = PriceQuote::priced(d("2"), Some(PoolId::new("token-pool".to_string())));

        let report = aggregator
            .aggregate(
                &token,
                &[transfer(Side::Buy, "10", 1, "0.001")],
                &current_token,
                &PriceQuote::unavailable(),
            )
            .await
            .unwrap();
        assert_eq!(report.total_fees_quote, d("0.005"));
        assert!(report.fallbacks.is_empty());

        let result = aggregator
            .aggregate(
                &token,
                &[transfer(Side::Buy, "10", 2, "0.001")],
                &current_token,
                &PriceQuote::unavailable(),
            )
            .await;
        assert!(matches!(
            result,
            Err(AggregationError::Unpriceable(PricedAsset::Native))
        ));
    }
}
