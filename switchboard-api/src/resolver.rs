//! Tenant resolution: phone number through the cache, ID straight to the directory.

use std::sync::Arc;

use switchboard_core::{
    SwitchboardError, SwitchboardResult, TenantCache, TenantDirectory, TenantId, TenantRecord,
};

use crate::telemetry::metrics;

/// Masks all but the last four characters of a phone number for logs.
pub(crate) fn redact_phone(phone_number: &str) -> String {
    let chars: Vec<char> = phone_number.chars().collect();
    let keep = chars.len().min(4);
    let masked = chars.len() - keep;
    std::iter::repeat('*')
        .take(masked)
        .chain(chars[masked..].iter().copied())
        .collect()
}

/// Cache-then-directory tenant lookup.
#[derive(Clone)]
pub struct TenantResolver {
    cache: TenantCache,
    directory: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    pub fn new(cache: TenantCache, directory: Arc<dyn TenantDirectory>) -> Self {
        Self { cache, directory }
    }

    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Tenant owning `phone_number`, if any.
    ///
    /// Fresh cache entries are served without touching the directory. Directory
    /// hits are cached; misses are not.
    pub async fn by_phone(&self, phone_number: &str) -> SwitchboardResult<Option<TenantRecord>> {
        if let Some(record) = self.cache.lookup(phone_number) {
            record_lookup(true);
            tracing::debug!(tenant_id = %record.id, "Tenant cache hit");
            return Ok(Some(record));
        }
        record_lookup(false);

        let found = self.directory.tenant_by_phone(phone_number).await?;
        match &found {
            Some(record) => {
                tracing::debug!(tenant_id = %record.id, "Tenant loaded from directory");
                self.cache.store(phone_number, record.clone());
            }
            None => tracing::debug!(
                phone_number = %redact_phone(phone_number),
                "No tenant for phone number"
            ),
        }
        Ok(found)
    }

    /// Like [`Self::by_phone`], with absence as an error.
    pub async fn require_by_phone(&self, phone_number: &str) -> SwitchboardResult<TenantRecord> {
        self.by_phone(phone_number)
            .await?
            .ok_or_else(|| SwitchboardError::TenantNotFound {
                key: format!("phone number {}", phone_number),
            })
    }

    /// Tenant by ID. Tool endpoints address tenants this way and bypass the cache.
    pub async fn require_by_id(&self, tenant_id: &TenantId) -> SwitchboardResult<TenantRecord> {
        self.directory
            .tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| SwitchboardError::TenantNotFound {
                key: format!("client_id {}", tenant_id),
            })
    }
}

fn record_lookup(hit: bool) {
    if let Some(metrics) = metrics() {
        metrics.record_cache_lookup(hit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use switchboard_core::{BearerToken, InMemoryTenantDirectory, ManualClock};

    #[test]
    fn test_redact_phone_keeps_last_four() {
        assert_eq!(redact_phone("+15550000001"), "********0001");
        assert_eq!(redact_phone("911"), "911");
        assert_eq!(redact_phone(""), "");
    }

    fn record(token: &str) -> TenantRecord {
        TenantRecord {
            id: TenantId::from("T1"),
            phone_number: "+15550000001".to_string(),
            crm_token: Some(BearerToken::new(token)),
            location_id: Some("LOC1".to_string()),
            calendar_id: Some("CAL1".to_string()),
            display_name: "Acme".to_string(),
            timezone: None,
        }
    }

    fn resolver(directory: Arc<InMemoryTenantDirectory>) -> (TenantResolver, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = TenantCache::with_clock(Duration::from_secs(300), clock.clone());
        (TenantResolver::new(cache, directory), clock)
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() -> SwitchboardResult<()> {
        let directory = Arc::new(InMemoryTenantDirectory::with_tenants([record("old")]));
        let (resolver, _clock) = resolver(directory.clone());

        assert!(resolver.by_phone("+15550000001").await?.is_some());
        assert!(resolver.by_phone("+15550000001").await?.is_some());
        assert_eq!(directory.query_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_entry_requeries_and_sees_rotation() -> SwitchboardResult<()> {
        let directory = Arc::new(InMemoryTenantDirectory::with_tenants([record("old")]));
        let (resolver, clock) = resolver(directory.clone());

        resolver.by_phone("+15550000001").await?;
        directory.put(record("new")).await;

        let stale = resolver.require_by_phone("+15550000001").await?;
        assert_eq!(stale.bearer_token()?.expose(), "old");

        clock.advance(Duration::from_secs(300));
        let fresh = resolver.require_by_phone("+15550000001").await?;
        assert_eq!(fresh.bearer_token()?.expose(), "new");
        assert_eq!(directory.query_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() -> SwitchboardResult<()> {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let (resolver, _clock) = resolver(directory.clone());

        assert!(resolver.by_phone("+19999999999").await?.is_none());
        assert!(resolver.by_phone("+19999999999").await?.is_none());
        assert_eq!(directory.query_count(), 2);
        assert!(resolver.cache().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let (resolver, _clock) = resolver(directory);
        let err = resolver.require_by_id(&TenantId::from("T404")).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::TenantNotFound { .. }));
    }
}
