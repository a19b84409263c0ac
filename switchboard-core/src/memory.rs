//! In-memory directory and session store.
//!
//! Used for local development (seeded from a JSON file) and as the storage
//! collaborator in tests. Each store counts the queries it serves so tests can
//! assert when the directory was or was not consulted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::directory::{SessionStore, TenantDirectory};
use crate::error::{SwitchboardError, SwitchboardResult};
use crate::session::{CallSession, SessionContext};
use crate::tenant::{TenantId, TenantRecord};

// ============================================================================
// TENANT DIRECTORY
// ============================================================================

#[derive(Default)]
pub struct InMemoryTenantDirectory {
    tenants: RwLock<HashMap<TenantId, TenantRecord>>,
    queries: AtomicUsize,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        let tenants = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            tenants: RwLock::new(tenants),
            queries: AtomicUsize::new(0),
        }
    }

    /// Parse a JSON array of `clients` rows.
    pub fn from_json(json: &str) -> SwitchboardResult<Self> {
        let records: Vec<TenantRecord> = serde_json::from_str(json)
            .map_err(|e| SwitchboardError::invalid_value("tenants", e.to_string()))?;
        Ok(Self::with_tenants(records))
    }

    /// Insert or replace a tenant (administrative path, used by tests).
    pub async fn put(&self, record: TenantRecord) {
        let mut tenants = self.tenants.write().await;
        tenants.insert(record.id.clone(), record);
    }

    /// Number of lookups served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn tenant_by_phone(&self, phone_number: &str) -> SwitchboardResult<Option<TenantRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let tenants = self.tenants.read().await;
        Ok(tenants
            .values()
            .find(|record| record.phone_number == phone_number)
            .cloned())
    }

    async fn tenant_by_id(&self, tenant_id: &TenantId) -> SwitchboardResult<Option<TenantRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).cloned())
    }
}

// ============================================================================
// SESSION STORE
// ============================================================================

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn upsert_session(&self, session: &CallSession) -> SwitchboardResult<CallSession> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.call_id.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, call_id: &str) -> SwitchboardResult<Option<CallSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(call_id).cloned())
    }

    async fn update_context(
        &self,
        call_id: &str,
        context: &SessionContext,
    ) -> SwitchboardResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(call_id) {
            Some(session) => {
                session.context = context.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close_session(
        &self,
        call_id: &str,
        ended_at: DateTime<Utc>,
        recording_url: Option<&str>,
        context: &SessionContext,
    ) -> SwitchboardResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(call_id) {
            Some(session) => {
                session.ended_at = Some(ended_at);
                session.recording_url = recording_url.map(str::to_string);
                session.context = context.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
