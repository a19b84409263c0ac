//! Shared application state for Axum routers.

use std::sync::Arc;

use switchboard_core::{SessionStore, TenantCache, TenantDirectory};

use crate::auth::WebhookAuth;
use crate::config::RelayConfig;
use crate::forwarder::Forwarder;
use crate::resolver::TenantResolver;
use crate::upstream::CrmApi;
use crate::webhooks::WebhookDispatcher;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub resolver: TenantResolver,
    pub forwarder: Forwarder,
    pub dispatcher: WebhookDispatcher,
    pub webhook_auth: Arc<WebhookAuth>,
}

impl AppState {
    /// Wire the relay from its collaborators, with a system-clock cache.
    pub fn new(
        config: &RelayConfig,
        directory: Arc<dyn TenantDirectory>,
        sessions: Arc<dyn SessionStore>,
        crm: Arc<dyn CrmApi>,
    ) -> Self {
        let cache = TenantCache::new(config.tenant_cache_ttl);
        Self::with_cache(config, cache, directory, sessions, crm)
    }

    /// Same as [`Self::new`] with a caller-supplied cache (tests inject a manual clock).
    pub fn with_cache(
        config: &RelayConfig,
        cache: TenantCache,
        directory: Arc<dyn TenantDirectory>,
        sessions: Arc<dyn SessionStore>,
        crm: Arc<dyn CrmApi>,
    ) -> Self {
        let resolver = TenantResolver::new(cache, directory);
        let forwarder = Forwarder::new(crm);
        let dispatcher = WebhookDispatcher::new(
            resolver.clone(),
            sessions,
            forwarder.clone(),
            config.public_base_url.clone(),
        );

        Self {
            resolver,
            forwarder,
            dispatcher,
            webhook_auth: Arc::new(WebhookAuth::from_config(config)),
        }
    }
}

crate::impl_from_ref!(TenantResolver, resolver);
crate::impl_from_ref!(Forwarder, forwarder);
crate::impl_from_ref!(WebhookDispatcher, dispatcher);
crate::impl_from_ref!(Arc<WebhookAuth>, webhook_auth);
