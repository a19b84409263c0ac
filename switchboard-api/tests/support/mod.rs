//! Shared fixtures for the relay integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde_json::{json, Value as JsonValue};
use tokio::sync::mpsc;
use tower::ServiceExt;

use switchboard_api::upstream::{
    AppointmentRequest, ByteStream, ContactDraft, ContactQuery, CrmApi, CrmError, McpReply,
    NoteRequest, UpstreamReply,
};
use switchboard_api::{create_api_router, AppState, RelayConfig};
use switchboard_core::{
    BearerToken, InMemorySessionStore, InMemoryTenantDirectory, ManualClock, TenantCache, TenantId,
    TenantRecord,
};

pub const TENANT_PHONE: &str = "+15550000001";
pub const CALLER_PHONE: &str = "+15557654321";
pub const WEBHOOK_TOKEN: &str = "whk_test_token_123";

// ============================================================================
// TENANTS
// ============================================================================

/// A fully configured tenant.
pub fn tenant(id: &str, phone: &str) -> TenantRecord {
    TenantRecord {
        id: TenantId::from(id),
        phone_number: phone.to_string(),
        crm_token: Some(BearerToken::new(format!("tok_{}", id))),
        location_id: Some(format!("LOC_{}", id)),
        calendar_id: Some(format!("CAL_{}", id)),
        display_name: format!("Tenant {}", id),
        timezone: Some("America/Los_Angeles".to_string()),
    }
}

// ============================================================================
// MOCK UPSTREAM
// ============================================================================

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub token: String,
    pub payload: JsonValue,
}

type Scripted = Mutex<Result<UpstreamReply, CrmError>>;

fn ok(body: JsonValue) -> Scripted {
    Mutex::new(Ok(UpstreamReply::new(200, body)))
}

/// Counting `CrmApi` with scripted replies.
pub struct MockCrm {
    calls: Mutex<Vec<RecordedCall>>,
    pub search: Scripted,
    pub create: Scripted,
    pub slots: Scripted,
    pub appointment: Scripted,
    pub note: Scripted,
    pub mcp_json: Scripted,
    mcp_stream: Mutex<Option<mpsc::Receiver<Bytes>>>,
}

impl Default for MockCrm {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            search: ok(json!({ "contacts": [] })),
            create: ok(json!({ "contact": { "id": "C_NEW" } })),
            slots: ok(json!({})),
            appointment: ok(json!({ "id": "APT1" })),
            note: ok(json!({ "note": { "id": "N1" } })),
            mcp_json: ok(json!({ "jsonrpc": "2.0", "id": 1, "result": {} })),
            mcp_stream: Mutex::new(None),
        }
    }
}

impl MockCrm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(slot: &Scripted, status: u16, body: JsonValue) {
        *slot.lock().unwrap() = Ok(UpstreamReply::new(status, body));
    }

    pub fn fail(slot: &Scripted, err: CrmError) {
        *slot.lock().unwrap() = Err(err);
    }

    /// Serve the next `/mcp` call as an event stream fed by the returned sender.
    pub fn stream_next_mcp(&self) -> mpsc::Sender<Bytes> {
        let (tx, rx) = mpsc::channel(8);
        *self.mcp_stream.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }

    fn record(&self, operation: &'static str, token: &BearerToken, payload: JsonValue) {
        self.calls.lock().unwrap().push(RecordedCall {
            operation,
            token: token.expose().to_string(),
            payload,
        });
    }
}

#[async_trait]
impl CrmApi for MockCrm {
    async fn search_contacts(
        &self,
        token: &BearerToken,
        query: &ContactQuery,
    ) -> Result<UpstreamReply, CrmError> {
        self.record(
            "search",
            token,
            json!({ "locationId": query.location_id, "phone": query.phone, "email": query.email }),
        );
        self.search.lock().unwrap().clone()
    }

    async fn create_contact(
        &self,
        token: &BearerToken,
        draft: &ContactDraft,
    ) -> Result<UpstreamReply, CrmError> {
        self.record("create", token, serde_json::to_value(draft).unwrap());
        self.create.lock().unwrap().clone()
    }

    async fn free_slots(
        &self,
        token: &BearerToken,
        calendar_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<UpstreamReply, CrmError> {
        self.record(
            "slots",
            token,
            json!({ "calendarId": calendar_id, "startDate": start_ms, "endDate": end_ms }),
        );
        self.slots.lock().unwrap().clone()
    }

    async fn create_appointment(
        &self,
        token: &BearerToken,
        request: &AppointmentRequest,
    ) -> Result<UpstreamReply, CrmError> {
        self.record("appointment", token, serde_json::to_value(request).unwrap());
        self.appointment.lock().unwrap().clone()
    }

    async fn create_note(
        &self,
        token: &BearerToken,
        contact_id: &str,
        note: &NoteRequest,
    ) -> Result<UpstreamReply, CrmError> {
        let mut payload = serde_json::to_value(note).unwrap();
        payload["contactId"] = json!(contact_id);
        self.record("note", token, payload);
        self.note.lock().unwrap().clone()
    }

    async fn mcp(
        &self,
        token: &BearerToken,
        location_id: &str,
        body: Bytes,
    ) -> Result<McpReply, CrmError> {
        let raw = String::from_utf8_lossy(&body).to_string();
        self.record("mcp", token, json!({ "locationId": location_id, "body": raw }));

        if let Some(rx) = self.mcp_stream.lock().unwrap().take() {
            let body: ByteStream = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (Ok(chunk), rx))
            })
            .boxed();
            return Ok(McpReply::Stream { status: 200, body });
        }
        self.mcp_json.lock().unwrap().clone().map(McpReply::Json)
    }
}

// ============================================================================
// APP
// ============================================================================

/// Relay wired to in-memory stores, the mock upstream and a manual clock.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub crm: Arc<MockCrm>,
    pub directory: Arc<InMemoryTenantDirectory>,
    pub sessions: Arc<InMemorySessionStore>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new(tenants: Vec<TenantRecord>) -> Self {
        Self::with_config(tenants, test_config(Some(WEBHOOK_TOKEN)))
    }

    pub fn with_config(tenants: Vec<TenantRecord>, config: RelayConfig) -> Self {
        let crm = MockCrm::new();
        let directory = Arc::new(InMemoryTenantDirectory::with_tenants(tenants));
        let sessions = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(1_760_000_000_000));
        let cache = TenantCache::with_clock(config.tenant_cache_ttl, clock.clone());

        let state = AppState::with_cache(
            &config,
            cache,
            directory.clone(),
            sessions.clone(),
            crm.clone(),
        );
        Self {
            router: create_api_router(state.clone()),
            state,
            crm,
            directory,
            sessions,
            clock,
        }
    }

    /// POST a JSON body and decode the JSON reply.
    pub async fn post_json(
        &self,
        uri: &str,
        body: JsonValue,
        headers: &[(&str, &str)],
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, json)
    }
}

pub fn test_config(webhook_token: Option<&str>) -> RelayConfig {
    RelayConfig {
        webhook_token: webhook_token.map(|t| secrecy::SecretString::new(t.to_string().into())),
        public_base_url: "https://relay.test".to_string(),
        tenant_cache_ttl: Duration::from_secs(300),
        ..RelayConfig::default()
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
