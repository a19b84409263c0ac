//! Credential-Scoped Forwarder
//!
//! Turns a resolved tenant plus a tool payload into upstream CRM calls and
//! maps the results onto the response contracts the voice platform expects.
//!
//! Every check that can fail without the network (credentials present, dates
//! parseable) runs before the first outbound call.

use std::sync::Arc;

use axum::body::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use switchboard_core::TenantRecord;

use crate::error::{ApiError, ApiResult};
use crate::upstream::{
    AppointmentRequest, ContactDraft, ContactQuery, CrmApi, CrmError, McpReply, NoteRequest,
    UpstreamReply,
};

/// Title used when the caller does not name the appointment.
pub const DEFAULT_APPOINTMENT_TITLE: &str = "Appointment";

/// Status every booked appointment is created with.
const APPOINTMENT_STATUS: &str = "confirmed";

// ============================================================================
// INPUTS AND OUTCOMES
// ============================================================================

/// Who to find or create. At least one of phone or email must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactInput {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Result of find-or-create.
///
/// `duplicate` is only serialized when set, so a plain hit or create looks
/// like `{contactId, existed, contact}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactOutcome {
    pub contact_id: Option<String>,
    pub existed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
    pub contact: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInput {
    pub contact_id: String,
    pub start_time: String,
    pub end_time: String,
    pub title: Option<String>,
    pub notes: Option<String>,
}

// ============================================================================
// FORWARDER
// ============================================================================

#[derive(Clone)]
pub struct Forwarder {
    crm: Arc<dyn CrmApi>,
}

impl Forwarder {
    pub fn new(crm: Arc<dyn CrmApi>) -> Self {
        Self { crm }
    }

    /// Search by phone (or email), create when nothing matches.
    ///
    /// A failed search is logged and treated as "not found". A create rejected
    /// as a duplicate (400 with `meta.contactId`) resolves to the existing
    /// contact.
    pub async fn find_or_create_contact(
        &self,
        tenant: &TenantRecord,
        input: ContactInput,
    ) -> ApiResult<ContactOutcome> {
        let phone = non_empty(input.phone);
        let email = non_empty(input.email);
        if phone.is_none() && email.is_none() {
            return Err(ApiError::missing_fields("phone or email is required"));
        }
        let creds = tenant.credentials()?;

        let query = ContactQuery {
            location_id: creds.location_id.clone(),
            phone: phone.clone(),
            email: email.clone(),
        };
        match self.crm.search_contacts(&creds.token, &query).await {
            Ok(reply) if reply.is_success() => {
                if let Some(contact) = first_contact(&reply.body) {
                    tracing::debug!(tenant_id = %tenant.id, "Existing contact found");
                    return Ok(ContactOutcome {
                        contact_id: id_of(&contact),
                        existed: true,
                        duplicate: false,
                        contact,
                    });
                }
            }
            Ok(reply) => {
                tracing::warn!(tenant_id = %tenant.id, status = reply.status, "Contact search rejected; creating instead");
            }
            Err(err) => {
                tracing::warn!(tenant_id = %tenant.id, error = %err, "Contact search failed; creating instead");
            }
        }

        let draft = ContactDraft {
            location_id: creds.location_id,
            phone,
            email,
            name: non_empty(input.name),
        };
        let reply = self
            .crm
            .create_contact(&creds.token, &draft)
            .await
            .map_err(|e| unreachable_error("create contact", e))?;

        if reply.status == 400 {
            if let Some(existing) = reply
                .body
                .pointer("/meta/contactId")
                .and_then(JsonValue::as_str)
            {
                tracing::info!(tenant_id = %tenant.id, "Duplicate contact; reusing existing ID");
                return Ok(ContactOutcome {
                    contact_id: Some(existing.to_string()),
                    existed: true,
                    duplicate: true,
                    contact: JsonValue::Null,
                });
            }
        }

        if !reply.is_success() {
            return Err(upstream_error("Failed to create contact", reply));
        }

        let contact = reply.body.get("contact").cloned().unwrap_or(JsonValue::Null);
        Ok(ContactOutcome {
            contact_id: id_of(&contact),
            existed: false,
            duplicate: false,
            contact,
        })
    }

    /// Free slots between two ISO-8601 instants.
    pub async fn check_availability(
        &self,
        tenant: &TenantRecord,
        start_date: &str,
        end_date: &str,
    ) -> ApiResult<JsonValue> {
        let start_ms = parse_instant_ms("start_date", start_date)?;
        let end_ms = parse_instant_ms("end_date", end_date)?;
        let token = tenant.bearer_token()?;
        let calendar_id = tenant.calendar()?;

        let reply = self
            .crm
            .free_slots(token, calendar_id, start_ms, end_ms)
            .await
            .map_err(|e| unreachable_error("check availability", e))?;
        if !reply.is_success() {
            return Err(upstream_error("Failed to check availability", reply));
        }

        Ok(json!({ "success": true, "slots": reply.body }))
    }

    pub async fn book_appointment(
        &self,
        tenant: &TenantRecord,
        input: BookingInput,
    ) -> ApiResult<JsonValue> {
        let creds = tenant.credentials()?;
        let calendar_id = tenant.calendar()?;

        let request = AppointmentRequest {
            calendar_id: calendar_id.to_string(),
            location_id: creds.location_id,
            contact_id: input.contact_id,
            start_time: input.start_time,
            end_time: input.end_time,
            title: non_empty(input.title).unwrap_or_else(|| DEFAULT_APPOINTMENT_TITLE.to_string()),
            appointment_status: APPOINTMENT_STATUS.to_string(),
            notes: non_empty(input.notes),
        };

        let reply = self
            .crm
            .create_appointment(&creds.token, &request)
            .await
            .map_err(|e| unreachable_error("book appointment", e))?;
        if !reply.is_success() {
            return Err(upstream_error("Failed to book appointment", reply));
        }

        tracing::info!(tenant_id = %tenant.id, "Appointment booked");
        Ok(json!({ "success": true, "appointment": reply.body }))
    }

    /// Attach a note to a contact. The location ID doubles as the note author.
    pub async fn add_note(
        &self,
        tenant: &TenantRecord,
        contact_id: &str,
        body: String,
    ) -> ApiResult<JsonValue> {
        let creds = tenant.credentials()?;
        let note = NoteRequest {
            body,
            user_id: creds.location_id,
        };

        let reply = self
            .crm
            .create_note(&creds.token, contact_id, &note)
            .await
            .map_err(|e| unreachable_error("create note", e))?;
        if !reply.is_success() {
            return Err(upstream_error("Failed to create note", reply));
        }
        Ok(reply.body)
    }

    /// Forward a raw protocol message with the tenant's credentials.
    pub async fn relay_mcp(&self, tenant: &TenantRecord, body: Bytes) -> ApiResult<McpReply> {
        let creds = tenant.credentials()?;
        self.crm
            .mcp(&creds.token, &creds.location_id, body)
            .await
            .map_err(|e| unreachable_error("relay protocol request", e))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_contact(body: &JsonValue) -> Option<JsonValue> {
    body.get("contacts")
        .and_then(JsonValue::as_array)
        .and_then(|contacts| contacts.first())
        .cloned()
}

fn id_of(contact: &JsonValue) -> Option<String> {
    contact.get("id").and_then(JsonValue::as_str).map(str::to_string)
}

fn upstream_error(message: &str, reply: UpstreamReply) -> ApiError {
    ApiError::upstream(reply.status, message, reply.body)
}

fn unreachable_error(action: &str, err: CrmError) -> ApiError {
    ApiError::upstream_unreachable(format!("Failed to {}: {}", action, err))
}

/// Parse an ISO-8601 instant into epoch milliseconds.
///
/// Accepts RFC 3339 with offset, or a naive date-time/date taken as UTC.
pub fn parse_instant_ms(field: &str, value: &str) -> ApiResult<i64> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }
    Err(ApiError::invalid_format(field, "an ISO-8601 date or date-time"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_rfc3339_with_zulu() -> ApiResult<()> {
        assert_eq!(parse_instant_ms("start_date", "2025-10-05T00:00:00Z")?, 1_759_622_400_000);
        Ok(())
    }

    #[test]
    fn test_parse_rfc3339_with_offset() -> ApiResult<()> {
        assert_eq!(
            parse_instant_ms("start_date", "2025-10-04T17:00:00-07:00")?,
            1_759_622_400_000
        );
        Ok(())
    }

    #[test]
    fn test_parse_naive_forms_as_utc() -> ApiResult<()> {
        assert_eq!(parse_instant_ms("d", "2025-10-05T00:00:00")?, 1_759_622_400_000);
        assert_eq!(parse_instant_ms("d", "2025-10-05T00:00")?, 1_759_622_400_000);
        assert_eq!(parse_instant_ms("d", "2025-10-05")?, 1_759_622_400_000);
        assert_eq!(parse_instant_ms("d", "2025-10-05T23:59:59")?, 1_759_708_799_000);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_instant_ms("end_date", "next tuesday").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
        assert!(err.message.contains("end_date"));
    }

    #[test]
    fn test_contact_outcome_hides_false_duplicate() -> Result<(), serde_json::Error> {
        let outcome = ContactOutcome {
            contact_id: Some("C9".to_string()),
            existed: false,
            duplicate: false,
            contact: json!({"id": "C9"}),
        };
        assert_eq!(
            serde_json::to_value(&outcome)?,
            json!({"contactId": "C9", "existed": false, "contact": {"id": "C9"}})
        );
        Ok(())
    }

    #[test]
    fn test_first_contact() {
        let body = json!({"contacts": [{"id": "C1"}, {"id": "C2"}]});
        assert_eq!(first_contact(&body).and_then(|c| id_of(&c)), Some("C1".to_string()));
        assert_eq!(first_contact(&json!({"contacts": []})), None);
        assert_eq!(first_contact(&json!({"raw": "nope"})), None);
    }
}
