//! Liveness and metrics endpoints. No authentication.

use axum::{routing::get, Router};

use crate::state::AppState;
use crate::telemetry::metrics_handler;

/// GET / - banner
pub async fn banner() -> &'static str {
    "switchboard relay is running"
}

/// GET /health - liveness
pub async fn health() -> &'static str {
    "ok"
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
}
