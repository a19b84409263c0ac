//! Storage traits for the external datastore.
//!
//! The relay never owns tenant or session data; it only performs point reads
//! and upserts against two logical tables. Implementations live in
//! [`crate::memory`] (development/tests) and in the API crate (PostgreSQL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SwitchboardResult;
use crate::session::{CallSession, SessionContext};
use crate::tenant::{TenantId, TenantRecord};

/// Read-only view of the tenant records.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Look up the tenant that owns an inbound phone number.
    async fn tenant_by_phone(&self, phone_number: &str) -> SwitchboardResult<Option<TenantRecord>>;

    /// Look up a tenant by its ID.
    async fn tenant_by_id(&self, tenant_id: &TenantId) -> SwitchboardResult<Option<TenantRecord>>;
}

/// Call session persistence keyed by call ID.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session with `session.call_id`.
    ///
    /// Calling this twice for the same call ID leaves a single row.
    async fn upsert_session(&self, session: &CallSession) -> SwitchboardResult<CallSession>;

    async fn get_session(&self, call_id: &str) -> SwitchboardResult<Option<CallSession>>;

    /// Replace the context bag. Returns `false` when no such session exists.
    async fn update_context(&self, call_id: &str, context: &SessionContext)
        -> SwitchboardResult<bool>;

    /// Record the end of a call. Returns `false` when no such session exists.
    async fn close_session(
        &self,
        call_id: &str,
        ended_at: DateTime<Utc>,
        recording_url: Option<&str>,
        context: &SessionContext,
    ) -> SwitchboardResult<bool>;
}
