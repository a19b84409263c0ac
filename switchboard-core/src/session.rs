//! Call sessions: one row per inbound call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::tenant::TenantId;

/// Context key holding the CRM contact linked to the caller.
pub const CONTACT_ID_KEY: &str = "crm_contact_id";

/// Open-ended context bag attached to a session.
///
/// Known keys: `status`, `platform_call_id`, `crm_contact_id`, `last_status`,
/// `updated_at`, `ended_reason`, `duration`, `transcript`, `summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionContext(Map<String, JsonValue>);

impl SessionContext {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a context from a JSON value; anything but an object yields an empty bag.
    pub fn from_value(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Shallow merge: keys in `patch` overwrite existing keys, others are kept.
    pub fn merge(&mut self, patch: SessionContext) {
        for (key, value) in patch.0 {
            self.0.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn crm_contact_id(&self) -> Option<&str> {
        self.get_str(CONTACT_ID_KEY)
    }

    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }
}

/// A call session as persisted in the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub call_id: String,
    pub tenant_id: TenantId,
    pub caller: Option<String>,
    pub called_number: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub recording_url: Option<String>,
    pub context: SessionContext,
}

impl CallSession {
    /// A fresh session for a call that just started.
    pub fn started(
        call_id: impl Into<String>,
        tenant_id: TenantId,
        caller: Option<String>,
        called_number: Option<String>,
        context: SessionContext,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tenant_id,
            caller,
            called_number,
            started_at: Utc::now(),
            ended_at: None,
            recording_url: None,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_existing_keys() {
        let mut ctx = SessionContext::from_value(json!({
            "status": "in_progress",
            "crm_contact_id": "C1"
        }));
        let mut patch = SessionContext::new();
        patch.insert("status", "completed");
        patch.insert("summary", "Booked a cleaning");
        ctx.merge(patch);

        assert_eq!(ctx.get_str("status"), Some("completed"));
        assert_eq!(ctx.crm_contact_id(), Some("C1"));
        assert_eq!(ctx.get_str("summary"), Some("Booked a cleaning"));
    }

    #[test]
    fn test_non_object_context_is_empty() {
        let ctx = SessionContext::from_value(json!("nope"));
        assert_eq!(ctx, SessionContext::new());
    }
}
