//! Axum middleware guarding the webhook endpoint.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::WebhookAuth;

/// Reject webhook requests that fail the bearer check.
///
/// ```ignore
/// let app = Router::new()
///     .route("/webhooks", post(handle_webhook))
///     .layer(middleware::from_fn_with_state(auth.clone(), webhook_auth_middleware));
/// ```
pub async fn webhook_auth_middleware(
    State(auth): State<Arc<WebhookAuth>>,
    request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth.authenticate(auth_header) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(code = %err.code, path = %request.uri().path(), "Webhook authentication failed");
            err.into_response()
        }
    }
}
