pub mod health;
pub mod pnl;

use crate::orchestration::PnlRunner;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<PnlRunner>,
}

impl AppState {
    pub fn new(runner: Arc<PnlRunner>) -> Self {
        Self { runner }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/pnl", get(pnl::get_pnl))
        .layer(cors)
        .with_state(state)
}
