//! HTTP Routes
//!
//! - `GET /`, `GET /health`, `GET /metrics`: liveness and observability
//! - `POST /mcp`: protocol relay keyed by `x-phone-number`
//! - `POST /tools/*`: assistant tool calls keyed by `client_id`
//! - `POST /webhooks` (and `/vapi/webhooks`): lifecycle events, bearer-gated

pub mod health;
pub mod mcp;
pub mod tools;
pub mod webhooks;

use axum::{
    middleware::from_fn,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::observability_middleware;

pub use health::create_router as health_router;
pub use mcp::create_router as mcp_router;
pub use tools::create_router as tools_router;
pub use webhooks::create_router as webhooks_router;

/// Assemble the full relay router.
///
/// A handler panic becomes a 500 `INTERNAL_ERROR` response instead of a
/// dropped connection.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(health_router())
        .merge(mcp_router())
        .merge(tools_router())
        .merge(webhooks_router(&state))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(observability_middleware))
        .with_state(state)
}

fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    ApiError::internal_error("handler panicked").into_response()
}
