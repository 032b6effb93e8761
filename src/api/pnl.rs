use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::Address;
use crate::engine::{FallbackNotice, Report};
use crate::error::AppError;
use crate::orchestration::RunOutcome;

#[derive(Debug, Deserialize)]
pub struct PnlQuery {
    pub wallet: String,
    pub token: String,
}

/// Report figures in contract order, decimals as canonical strings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlResponse {
    pub total_tokens_held: String,
    pub cost_basis: String,
    pub current_value: String,
    pub unrealized_pnl: String,
    pub total_bought: String,
    pub total_sold: String,
    pub total_fees_quote: String,
    pub current_price: String,
    pub transfer_count: usize,
    pub fallbacks: Vec<FallbackNotice>,
}

impl From<Report> for PnlResponse {
    fn from(report: Report) -> Self {
        Self {
            total_tokens_held: report.held_quantity.to_canonical_string(),
            cost_basis: report.cost_basis.to_canonical_string(),
            current_value: report.current_value.to_canonical_string(),
            unrealized_pnl: report.unrealized_pnl.to_canonical_string(),
            total_bought: report.total_bought.to_canonical_string(),
            total_sold: report.total_sold.to_canonical_string(),
            total_fees_quote: report.total_fees_quote.to_canonical_string(),
            current_price: report.current_token_price.to_canonical_string(),
            transfer_count: report.transfer_count,
            fallbacks: report.fallbacks,
        }
    }
}

pub async fn get_pnl(
    Query(params): Query<PnlQuery>,
    State(state): State<AppState>,
) -> Result<Json<PnlResponse>, AppError> {
    let wallet = Address::parse(&params.wallet)
        .map_err(|e| AppError::BadRequest(format!("Invalid wallet address: {}", e)))?;
    let token = Address::parse(&params.token)
        .map_err(|e| AppError::BadRequest(format!("Invalid token address: {}", e)))?;

    match state.runner.run(&wallet, &token).await {
        RunOutcome::Report(report) => Ok(Json(PnlResponse::from(report))),
        RunOutcome::ProcessFailed { reason } => Err(AppError::ProcessFailed(reason)),
        RunOutcome::Error { cause } => Err(AppError::Upstream(cause)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, Slot};
    use crate::engine::{PositionState, PricedAsset};

    #[test]
    fn test_response_from_report() {
        let notice = FallbackNotice {
            slot: Slot::new(3),
            asset: PricedAsset::Token,
            substituted_price: Decimal::from(2),
        };
        let report = PositionState::new()
            .finalize(Decimal::from(2), vec![notice])
            .unwrap();
        let response = PnlResponse::from(report);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["totalTokensHeld"], "0");
        assert_eq!(json["currentPrice"], "2");
        assert_eq!(json["fallbacks"][0]["asset"], "token");
        assert_eq!(json["fallbacks"][0]["slot"], 3);
    }
}
