//! Upstream CRM/calendar API.
//!
//! [`CrmApi`] is the seam between the forwarder and the network. The
//! production implementation is [`LeadConnectorClient`]; tests substitute a
//! counting mock.
//!
//! Every call takes the tenant's bearer token explicitly. Non-success statuses
//! are not errors at this layer: they come back as an [`UpstreamReply`] and the
//! forwarder decides what they mean. [`CrmError`] is reserved for calls that
//! never produced a response.

mod lead_connector;

pub use lead_connector::LeadConnectorClient;

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::BoxStream;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use switchboard_core::BearerToken;

/// Transport-level upstream failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream stream interrupted: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for CrmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CrmError::Timeout
        } else {
            CrmError::Transport(err.to_string())
        }
    }
}

/// Raw byte stream from the upstream.
pub type ByteStream = BoxStream<'static, Result<Bytes, CrmError>>;

/// A buffered upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    /// Parsed JSON, or `{"raw": "<text>"}` when the body is not JSON.
    pub body: JsonValue,
}

impl UpstreamReply {
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse a response body, wrapping non-JSON text.
    pub fn parse_body(text: &str) -> JsonValue {
        serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
    }
}

/// Response of the protocol relay endpoint.
pub enum McpReply {
    /// Buffered JSON (or wrapped text) body.
    Json(UpstreamReply),
    /// Event stream to be relayed chunk by chunk.
    Stream { status: u16, body: ByteStream },
}

impl std::fmt::Debug for McpReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            McpReply::Json(reply) => f.debug_tuple("Json").field(reply).finish(),
            McpReply::Stream { status, .. } => {
                f.debug_struct("Stream").field("status", status).finish_non_exhaustive()
            }
        }
    }
}

// ============================================================================
// REQUEST PAYLOADS
// ============================================================================

/// Contact search parameters. Phone wins over email when both are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    pub location_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Body of a contact create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDraft {
    pub location_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of an appointment create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub calendar_id: String,
    pub location_id: String,
    pub contact_id: String,
    pub start_time: String,
    pub end_time: String,
    pub title: String,
    pub appointment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Body of a contact note create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub body: String,
    pub user_id: String,
}

// ============================================================================
// CLIENT TRAIT
// ============================================================================

/// Credential-scoped operations against the upstream CRM.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn search_contacts(
        &self,
        token: &BearerToken,
        query: &ContactQuery,
    ) -> Result<UpstreamReply, CrmError>;

    async fn create_contact(
        &self,
        token: &BearerToken,
        draft: &ContactDraft,
    ) -> Result<UpstreamReply, CrmError>;

    /// Free slots between two epoch-millisecond instants.
    async fn free_slots(
        &self,
        token: &BearerToken,
        calendar_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<UpstreamReply, CrmError>;

    async fn create_appointment(
        &self,
        token: &BearerToken,
        request: &AppointmentRequest,
    ) -> Result<UpstreamReply, CrmError>;

    async fn create_note(
        &self,
        token: &BearerToken,
        contact_id: &str,
        note: &NoteRequest,
    ) -> Result<UpstreamReply, CrmError>;

    /// Forward a raw protocol message. The body is passed through untouched.
    async fn mcp(
        &self,
        token: &BearerToken,
        location_id: &str,
        body: Bytes,
    ) -> Result<McpReply, CrmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_wraps_non_json() {
        assert_eq!(UpstreamReply::parse_body(r#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(
            UpstreamReply::parse_body("Bad Gateway"),
            json!({"raw": "Bad Gateway"})
        );
        assert_eq!(UpstreamReply::parse_body(""), json!({"raw": ""}));
    }

    #[test]
    fn test_contact_draft_omits_absent_fields() -> Result<(), serde_json::Error> {
        let draft = ContactDraft {
            location_id: "LOC1".to_string(),
            phone: Some("+15551234567".to_string()),
            email: None,
            name: None,
        };
        assert_eq!(
            serde_json::to_value(&draft)?,
            json!({"locationId": "LOC1", "phone": "+15551234567"})
        );
        Ok(())
    }

    #[test]
    fn test_appointment_request_wire_names() -> Result<(), serde_json::Error> {
        let request = AppointmentRequest {
            calendar_id: "CAL1".to_string(),
            location_id: "LOC1".to_string(),
            contact_id: "C9".to_string(),
            start_time: "2025-10-03T15:00:00-07:00".to_string(),
            end_time: "2025-10-03T16:00:00-07:00".to_string(),
            title: "Appointment".to_string(),
            appointment_status: "confirmed".to_string(),
            notes: None,
        };
        let value = serde_json::to_value(&request)?;
        assert_eq!(value["calendarId"], "CAL1");
        assert_eq!(value["appointmentStatus"], "confirmed");
        assert!(value.get("notes").is_none());
        Ok(())
    }

    #[test]
    fn test_success_range() {
        assert!(UpstreamReply::new(201, JsonValue::Null).is_success());
        assert!(!UpstreamReply::new(400, JsonValue::Null).is_success());
    }
}
