//! Webhook Dispatcher
//!
//! Lifecycle events from the voice platform are classified by their type tag
//! (`type`, or `message.type` when the event is wrapped). `assistant-request`
//! is answered synchronously with an assistant configuration. Every other
//! event is acknowledged at once and processed on a spawned task: failures are
//! logged, never retried and never reported back to the platform, and pending
//! work may be lost on shutdown.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tokio::task::JoinHandle;

use switchboard_core::session::CONTACT_ID_KEY;
use switchboard_core::{CallSession, SessionContext, SessionStore, SwitchboardError};

use crate::assistant::{fallback_assistant, render_assistant, AssistantContext};
use crate::error::ApiResult;
use crate::forwarder::{ContactInput, Forwarder};
use crate::resolver::{redact_phone, TenantResolver};
use crate::telemetry::metrics;

// ============================================================================
// EVENT CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AssistantRequest,
    CallStarted,
    CallEnded,
    StatusUpdate,
    ToolCalls,
    Unrecognized,
}

impl EventKind {
    pub fn classify(type_tag: Option<&str>) -> Self {
        match type_tag {
            Some("assistant-request") => EventKind::AssistantRequest,
            Some("call.started") => EventKind::CallStarted,
            Some("call.ended") | Some("end-of-call-report") => EventKind::CallEnded,
            Some("status-update") => EventKind::StatusUpdate,
            Some("tool-calls") => EventKind::ToolCalls,
            _ => EventKind::Unrecognized,
        }
    }

    pub fn of(event: &JsonValue) -> Self {
        Self::classify(event_type(event))
    }

    /// Metrics/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AssistantRequest => "assistant_request",
            EventKind::CallStarted => "call_started",
            EventKind::CallEnded => "call_ended",
            EventKind::StatusUpdate => "status_update",
            EventKind::ToolCalls => "tool_calls",
            EventKind::Unrecognized => "unrecognized",
        }
    }
}

/// The event's type tag, top-level first.
pub fn event_type(event: &JsonValue) -> Option<&str> {
    event
        .get("type")
        .and_then(JsonValue::as_str)
        .or_else(|| event.pointer("/message/type").and_then(JsonValue::as_str))
}

// ============================================================================
// DISPATCHER
// ============================================================================

#[derive(Clone)]
pub struct WebhookDispatcher {
    resolver: TenantResolver,
    sessions: Arc<dyn SessionStore>,
    forwarder: Forwarder,
    public_base_url: Arc<str>,
}

impl WebhookDispatcher {
    pub fn new(
        resolver: TenantResolver,
        sessions: Arc<dyn SessionStore>,
        forwarder: Forwarder,
        public_base_url: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            resolver,
            sessions,
            forwarder,
            public_base_url: public_base_url.into(),
        }
    }

    /// Respond to an event. Deferred work is spawned, not awaited.
    pub async fn dispatch(&self, event: JsonValue) -> JsonValue {
        let kind = EventKind::of(&event);
        if let Some(metrics) = metrics() {
            metrics.record_webhook_event(kind.as_str());
        }
        tracing::info!(kind = kind.as_str(), event_type = event_type(&event), "Webhook received");

        match kind {
            EventKind::AssistantRequest => json!({ "assistant": self.assistant_for(&event).await }),
            EventKind::Unrecognized => {
                tracing::info!(event_type = event_type(&event), "Unhandled webhook event type");
                json!({ "received": true })
            }
            _ => {
                self.spawn(kind, event);
                json!({ "received": true })
            }
        }
    }

    /// Run a deferred handler in the background, logging its failure.
    pub fn spawn(&self, kind: EventKind, event: JsonValue) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher.handle(kind, &event).await {
                tracing::warn!(kind = kind.as_str(), code = %err.code, error = %err.message, "Webhook handler failed");
            }
        })
    }

    /// Run the handler for `kind` to completion.
    pub async fn handle(&self, kind: EventKind, event: &JsonValue) -> ApiResult<()> {
        match kind {
            EventKind::CallStarted => self.call_started(event).await,
            EventKind::CallEnded => self.call_ended(event).await,
            EventKind::StatusUpdate => self.status_update(event).await,
            EventKind::ToolCalls => {
                // Tools are served by the /tools endpoints; this is informational.
                tracing::info!(call_id = call_id(event).as_deref(), "tool-calls event received");
                Ok(())
            }
            EventKind::AssistantRequest | EventKind::Unrecognized => Ok(()),
        }
    }

    /// Assistant for the called number, or the generic one when nobody owns it.
    pub async fn assistant_for(&self, event: &JsonValue) -> JsonValue {
        let message = event.get("message").unwrap_or(event);
        let called = message.pointer("/phoneNumber/number").and_then(JsonValue::as_str);
        let caller = message.pointer("/customer/number").and_then(JsonValue::as_str);

        let Some(called) = called else {
            tracing::warn!("assistant-request without a called number; using fallback assistant");
            return fallback_assistant();
        };

        match self.resolver.by_phone(called).await {
            Ok(Some(tenant)) => {
                tracing::info!(tenant_id = %tenant.id, "Returning tenant assistant");
                render_assistant(&AssistantContext {
                    tenant: &tenant,
                    caller,
                    public_base_url: &self.public_base_url,
                    now: Utc::now(),
                })
            }
            Ok(None) => {
                tracing::warn!(
                    called_number = %redact_phone(called),
                    "No tenant for called number; using fallback assistant"
                );
                fallback_assistant()
            }
            Err(err) => {
                tracing::error!(error = %err, "Tenant lookup failed; using fallback assistant");
                fallback_assistant()
            }
        }
    }

    async fn call_started(&self, event: &JsonValue) -> ApiResult<()> {
        let call = call_of(event);
        let Some(call_id) = call_id(event) else {
            tracing::warn!("call.started without call id; skipping");
            return Ok(());
        };
        let caller = call.pointer("/customer/number").and_then(phone_text);
        let called = call
            .get("phoneNumber")
            .and_then(phone_text)
            .or_else(|| call.get("to").and_then(phone_text));

        let Some(called_number) = called.as_deref() else {
            return Err(SwitchboardError::missing_field("call.phoneNumber").into());
        };
        let tenant = self.resolver.require_by_phone(called_number).await?;

        let mut context = SessionContext::new();
        context.insert("platform_call_id", call_id.clone());
        context.insert("status", "in_progress");
        let session = CallSession::started(
            call_id.clone(),
            tenant.id.clone(),
            caller.clone(),
            called.clone(),
            context,
        );
        let mut session = self.sessions.upsert_session(&session).await?;
        tracing::info!(call_id = %call_id, tenant_id = %tenant.id, "Session started");

        let Some(caller) = caller else {
            return Ok(());
        };
        let outcome = self
            .forwarder
            .find_or_create_contact(
                &tenant,
                ContactInput {
                    phone: Some(caller),
                    ..ContactInput::default()
                },
            )
            .await?;

        if let Some(contact_id) = outcome.contact_id {
            session.context.insert(CONTACT_ID_KEY, contact_id.clone());
            self.sessions.update_context(&call_id, &session.context).await?;
            tracing::info!(call_id = %call_id, contact_id = %contact_id, "Caller linked to contact");
        }
        Ok(())
    }

    async fn call_ended(&self, event: &JsonValue) -> ApiResult<()> {
        let call = call_of(event);
        let message = event.get("message").unwrap_or(&JsonValue::Null);
        let Some(call_id) = call_id(event) else {
            tracing::warn!("call ended without call id; skipping");
            return Ok(());
        };

        let ended_reason = first_present(&[call, event, message], "endedReason");
        let transcript = first_present(&[event, message, call], "transcript");
        let summary = first_present(&[event, message, call], "summary");
        let recording_url = first_present(&[event, message, call], "recordingUrl");
        let duration = first_present(&[call, event, message], "duration");

        let mut session = self
            .sessions
            .get_session(&call_id)
            .await?
            .ok_or_else(|| SwitchboardError::SessionNotFound {
                call_id: call_id.clone(),
            })?;

        let mut patch = SessionContext::new();
        patch.insert("status", "completed");
        for (key, value) in [
            ("ended_reason", &ended_reason),
            ("duration", &duration),
            ("transcript", &transcript),
            ("summary", &summary),
        ] {
            if let Some(value) = value {
                patch.insert(key, value.clone());
            }
        }
        session.context.merge(patch);

        let recording = recording_url.as_ref().and_then(JsonValue::as_str);
        self.sessions
            .close_session(&call_id, Utc::now(), recording, &session.context)
            .await?;
        tracing::info!(call_id = %call_id, "Session completed");

        let Some(contact_id) = session.context.crm_contact_id().map(str::to_string) else {
            return Ok(());
        };
        let tenant = self.resolver.require_by_id(&session.tenant_id).await?;
        let note = call_note(
            duration.as_ref(),
            ended_reason.as_ref(),
            summary.as_ref(),
            recording,
        );
        self.forwarder.add_note(&tenant, &contact_id, note).await?;
        tracing::info!(call_id = %call_id, contact_id = %contact_id, "Call summary synced to CRM");
        Ok(())
    }

    async fn status_update(&self, event: &JsonValue) -> ApiResult<()> {
        let call = call_of(event);
        let message = event.get("message").unwrap_or(&JsonValue::Null);
        let Some(call_id) = call_id(event) else {
            tracing::debug!("status-update without call id; skipping");
            return Ok(());
        };
        let status = first_present(&[event, message, call], "status").unwrap_or(JsonValue::Null);

        let Some(mut session) = self.sessions.get_session(&call_id).await? else {
            tracing::debug!(call_id = %call_id, "Session not found for status update (may not be created yet)");
            return Ok(());
        };

        let mut patch = SessionContext::new();
        patch.insert("last_status", status);
        patch.insert("updated_at", Utc::now().to_rfc3339());
        session.context.merge(patch);
        self.sessions.update_context(&call_id, &session.context).await?;
        Ok(())
    }
}

// ============================================================================
// EVENT FIELD HELPERS
// ============================================================================

/// `event.call`, else `event.message.call`, else null.
fn call_of(event: &JsonValue) -> &JsonValue {
    event
        .get("call")
        .or_else(|| event.pointer("/message/call"))
        .unwrap_or(&JsonValue::Null)
}

fn call_id(event: &JsonValue) -> Option<String> {
    call_of(event).get("id").and_then(phone_text)
}

/// A string, a number, or an object carrying a `number` string.
fn phone_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Object(map) => map.get("number").and_then(phone_text),
        _ => None,
    }
}

fn first_present(scopes: &[&JsonValue], key: &str) -> Option<JsonValue> {
    scopes
        .iter()
        .filter_map(|scope| scope.get(key))
        .find(|value| !value.is_null())
        .cloned()
}

fn display_or_na(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

/// Note body attached to the caller's contact when a call ends.
fn call_note(
    duration: Option<&JsonValue>,
    ended_reason: Option<&JsonValue>,
    summary: Option<&JsonValue>,
    recording_url: Option<&str>,
) -> String {
    let summary = summary
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("No summary available");
    let mut note = format!(
        "AI Call Summary\nDuration: {}\nEnded: {}\n\n{}",
        display_or_na(duration),
        display_or_na(ended_reason),
        summary
    );
    if let Some(url) = recording_url {
        note.push_str(&format!("\n\nRecording: {}", url));
    }
    note
}
