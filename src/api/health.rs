use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Reports the pricing setup requests will run against.
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    let settings = state.runner.settings();
    Json(json!({
        "status": "ready",
        "quoteMint": settings.quote_mint.as_str(),
        "nativeMint": settings.native_mint.as_str(),
        "nativePool": settings.native_pool_id.as_ref().map(|pool| pool.as_str()),
    }))
}
