//! Tool endpoints called by the voice assistant during a call.
//!
//! Tenants are addressed by `client_id`. Required fields are checked before
//! the tenant is looked up, and the forwarder checks credentials before any
//! upstream call, so client errors never cost a round-trip.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use switchboard_core::TenantId;

use crate::error::{ApiError, ApiResult};
use crate::forwarder::{BookingInput, ContactInput, ContactOutcome, Forwarder};
use crate::resolver::TenantResolver;
use crate::state::AppState;

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindOrCreateContactRequest {
    pub client_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckAvailabilityRequest {
    pub client_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookAppointmentRequest {
    pub client_id: Option<String>,
    pub contact_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn find_or_create_contact(
    State(resolver): State<TenantResolver>,
    State(forwarder): State<Forwarder>,
    payload: Result<Json<FindOrCreateContactRequest>, JsonRejection>,
) -> ApiResult<Json<ContactOutcome>> {
    let req = json_body(payload)?;
    let client_id = required("client_id", req.client_id)?;
    if is_blank(&req.phone) && is_blank(&req.email) {
        return Err(ApiError::missing_fields("client_id and phone or email are required"));
    }

    let tenant = resolver.require_by_id(&TenantId::new(client_id)).await?;
    let outcome = forwarder
        .find_or_create_contact(
            &tenant,
            ContactInput {
                phone: req.phone,
                email: req.email,
                name: req.name,
            },
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn check_availability(
    State(resolver): State<TenantResolver>,
    State(forwarder): State<Forwarder>,
    payload: Result<Json<CheckAvailabilityRequest>, JsonRejection>,
) -> ApiResult<Json<JsonValue>> {
    let req = json_body(payload)?;
    let client_id = required("client_id", req.client_id)?;
    let start_date = required("start_date", req.start_date)?;
    let end_date = required("end_date", req.end_date)?;

    let tenant = resolver.require_by_id(&TenantId::new(client_id)).await?;
    let slots = forwarder
        .check_availability(&tenant, &start_date, &end_date)
        .await?;
    Ok(Json(slots))
}

pub async fn book_appointment(
    State(resolver): State<TenantResolver>,
    State(forwarder): State<Forwarder>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> ApiResult<Json<JsonValue>> {
    let req = json_body(payload)?;
    let client_id = required("client_id", req.client_id)?;
    let input = BookingInput {
        contact_id: required("contact_id", req.contact_id)?,
        start_time: required("start_time", req.start_time)?,
        end_time: required("end_time", req.end_time)?,
        title: req.title,
        notes: req.notes,
    };

    let tenant = resolver.require_by_id(&TenantId::new(client_id)).await?;
    let appointment = forwarder.book_appointment(&tenant, input).await?;
    Ok(Json(appointment))
}

// ============================================================================
// HELPERS
// ============================================================================

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::invalid_input(rejection.body_text()))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn required(field: &str, value: Option<String>) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field(field))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/tools/find_or_create_contact", post(find_or_create_contact))
        .route("/tools/check_availability", post(check_availability))
        .route("/tools/book_appointment", post(book_appointment))
}
