mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::Value;
use std::sync::Arc;
use tokenpnl::api::{self, AppState};
use tokenpnl::datasource::{DataSourceError, MockLedgerSource, MockMarketData};
use tokenpnl::domain::Slot;
use tower::util::ServiceExt;

fn app_with(ledger: MockLedgerSource, market: MockMarketData) -> axum::Router {
    api::create_router(AppState::new(Arc::new(runner(ledger, market))))
}

async fn get_pnl(app: axum::Router, wallet: &str, token: &str) -> (StatusCode, Value) {
    let request = axum::http::Request::builder()
        .method("GET")
        .uri(format!("/v1/pnl?wallet={}&token={}", wallet, token))
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_pnl_endpoint_returns_report() {
    let market = market()
        .with_historical_price(token(), Slot::new(1), d("1"))
        .with_historical_price(native_mint(), Slot::new(1), d("5"))
        .with_historical_price(native_mint(), Slot::new(2), d("2"));
    let app = app_with(ledger(round_trip("0.001")), market);

    let (status, json) = get_pnl(app, wallet().as_str(), token().as_str()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalTokensHeld"], "5");
    assert_eq!(json["costBasis"], "0");
    assert_eq!(json["currentValue"], "10");
    assert_eq!(json["unrealizedPnl"], "9.993");
    assert_eq!(json["totalBought"], "10");
    assert_eq!(json["totalSold"], "5");
    assert_eq!(json["totalFeesQuote"], "0.007");
    assert_eq!(json["currentPrice"], "2");
    assert_eq!(json["transferCount"], 2);

    let fallbacks = json["fallbacks"].as_array().unwrap();
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0]["slot"], 2);
    assert_eq!(fallbacks[0]["asset"], "token");
}

#[tokio::test]
async fn test_pnl_endpoint_empty_history_is_unprocessable() {
    let app = app_with(ledger(Vec::new()), market());

    let (status, json) = get_pnl(app, wallet().as_str(), token().as_str()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("no transfer activity"));
}

#[tokio::test]
async fn test_pnl_endpoint_unpriced_token_is_unprocessable() {
    let market = MockMarketData::new().with_current_price(native_mint(), d("150"), NATIVE_POOL);
    let app = app_with(ledger(round_trip("0")), market);

    let (status, _) = get_pnl(app, wallet().as_str(), token().as_str()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_pnl_endpoint_collaborator_error_is_bad_gateway() {
    let market = market().with_historical_error(DataSourceError::HttpError {
        status: 503,
        message: "node unavailable".to_string(),
    });
    let app = app_with(ledger(round_trip("0")), market);

    let (status, json) = get_pnl(app, wallet().as_str(), token().as_str()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("node unavailable"));
}

#[tokio::test]
async fn test_pnl_endpoint_rejects_malformed_wallet() {
    let app = app_with(ledger(round_trip("0")), market());

    let (status, json) = get_pnl(app, "0xdeadbeef", token().as_str()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid wallet address"));
}

#[tokio::test]
async fn test_pnl_endpoint_rejects_short_token_address() {
    let app = app_with(ledger(round_trip("0")), market());

    let (status, json) = get_pnl(app, wallet().as_str(), "abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid token address"));
}
