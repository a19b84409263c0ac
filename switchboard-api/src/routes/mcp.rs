//! Protocol relay endpoint.
//!
//! `POST /mcp` forwards the raw body to the upstream protocol endpoint with the
//! credentials of the tenant that owns `x-phone-number`. JSON replies are
//! returned with the upstream status; event streams are relayed as they arrive.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Response,
    routing::post,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::forwarder::Forwarder;
use crate::relay;
use crate::resolver::TenantResolver;
use crate::state::AppState;

/// Header naming the tenant's inbound phone number.
pub const PHONE_NUMBER_HEADER: &str = "x-phone-number";

pub async fn relay_mcp(
    State(resolver): State<TenantResolver>,
    State(forwarder): State<Forwarder>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let phone_number = headers
        .get(PHONE_NUMBER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::missing_field(PHONE_NUMBER_HEADER))?;

    let tenant = resolver.require_by_phone(phone_number).await?;
    let reply = forwarder.relay_mcp(&tenant, body).await?;
    tracing::debug!(tenant_id = %tenant.id, reply = ?reply, "Protocol request relayed");
    Ok(relay::into_response(reply))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/mcp", post(relay_mcp))
}
