//! Tenant Cache
//!
//! Maps an inbound phone number to the tenant that owns it, so that not every
//! call needs a directory round-trip.
//!
//! Contract:
//! - An entry is served only while `now - inserted_at < ttl`. Stale entries are
//!   reported as absent and simply overwritten by the next `store`.
//! - Directory misses are never cached; unknown numbers hit the directory every
//!   time.
//! - There is no invalidation. A rotated CRM token is picked up once the old
//!   entry ages out, so the staleness window is exactly `ttl`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::tenant::TenantRecord;

/// Default time-to-live for cached tenants (5 minutes).
pub const DEFAULT_TENANT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    record: TenantRecord,
    inserted_at_ms: i64,
}

/// Phone-number keyed tenant cache with a fixed TTL.
///
/// Entries are immutable once stored and replaced wholesale, so concurrent
/// stores for the same number just leave the last write in place.
#[derive(Clone)]
pub struct TenantCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TenantCache {
    /// Cache backed by the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached tenant for `phone_number` if it is still fresh.
    pub fn lookup(&self, phone_number: &str) -> Option<TenantRecord> {
        let entry = self.entries.get(phone_number)?;
        let age_ms = self.clock.now_millis().saturating_sub(entry.inserted_at_ms);
        if age_ms < self.ttl_ms() {
            Some(entry.record.clone())
        } else {
            None
        }
    }

    /// Record a tenant fetched from the directory.
    pub fn store(&self, phone_number: impl Into<String>, record: TenantRecord) {
        let entry = CacheEntry {
            record,
            inserted_at_ms: self.clock.now_millis(),
        };
        self.entries.insert(phone_number.into(), entry);
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

impl std::fmt::Debug for TenantCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}
