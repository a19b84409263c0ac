//! Webhook endpoint for voice platform lifecycle events.
//!
//! Mounted at `/webhooks` and at the legacy `/vapi/webhooks` path, both behind
//! the bearer auth gate.

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware::from_fn_with_state,
    routing::post,
    Json, Router,
};
use serde_json::Value as JsonValue;

use crate::error::{ApiError, ApiResult};
use crate::middleware::webhook_auth_middleware;
use crate::state::AppState;
use crate::webhooks::WebhookDispatcher;

pub async fn receive_webhook(
    State(dispatcher): State<WebhookDispatcher>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> ApiResult<Json<JsonValue>> {
    let Json(event) =
        payload.map_err(|rejection| ApiError::invalid_input(rejection.body_text()))?;
    Ok(Json(dispatcher.dispatch(event).await))
}

pub fn create_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/webhooks", post(receive_webhook))
        .route("/vapi/webhooks", post(receive_webhook))
        .route_layer(from_fn_with_state(
            state.webhook_auth.clone(),
            webhook_auth_middleware,
        ))
}
