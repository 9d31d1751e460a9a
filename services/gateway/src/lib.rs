//! HTTP transport for the Tessera credential issuer.
//!
//! Routes:
//! - `POST /auth/tokens`  issue a pair for `{ "user_id": ... }`
//! - `POST /auth/refresh` rotate `{ "refresh_token": ... }`
//! - `GET /health`, `GET /metrics`

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/auth/tokens", post(handlers::issue_tokens))
        .route("/auth/refresh", post(handlers::refresh_tokens))
        .with_state(state)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "tessera-gateway",
        "timestamp": Utc::now().to_rfc3339()
    })))
}
