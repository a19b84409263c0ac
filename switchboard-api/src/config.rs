//! Relay Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local development. Database settings live in [`crate::db::DbConfig`].

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use switchboard_core::DEFAULT_TENANT_TTL;

/// Default upstream CRM base URL.
pub const DEFAULT_CRM_BASE_URL: &str = "https://services.leadconnectorhq.com";

/// API version marker sent with every upstream CRM call.
pub const DEFAULT_CRM_API_VERSION: &str = "2021-07-28";

// ============================================================================
// STORE SELECTION
// ============================================================================

/// Which datastore backs the tenant directory and session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    /// In-process maps, optionally seeded from `SWITCHBOARD_TENANTS_FILE`.
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "memory" | "mem" => StoreKind::Memory,
            _ => StoreKind::Postgres,
        })
    }
}

// ============================================================================
// RELAY CONFIGURATION
// ============================================================================

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Expected webhook bearer token. `None` leaves the webhook endpoint open.
    pub webhook_token: Option<SecretString>,

    /// Externally reachable base URL advertised in assistant tool definitions.
    pub public_base_url: String,

    /// Upstream CRM base URL (no trailing slash).
    pub crm_base_url: String,

    /// Value of the upstream `Version` header.
    pub crm_api_version: String,

    /// Timeout for non-streaming upstream calls.
    pub crm_timeout: Duration,

    /// How long a cached tenant stays fresh.
    pub tenant_cache_ttl: Duration,

    pub store: StoreKind,

    /// JSON seed file for the in-memory directory.
    pub tenants_file: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_token: None,
            public_base_url: "http://localhost:3000".to_string(),
            crm_base_url: DEFAULT_CRM_BASE_URL.to_string(),
            crm_api_version: DEFAULT_CRM_API_VERSION.to_string(),
            crm_timeout: Duration::from_secs(30),
            tenant_cache_ttl: DEFAULT_TENANT_TTL,
            store: StoreKind::Postgres,
            tenants_file: None,
        }
    }
}

impl RelayConfig {
    /// Create RelayConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SWITCHBOARD_WEBHOOK_TOKEN` (or `VAPI_WEBHOOK_TOKEN`): webhook bearer token
    /// - `SWITCHBOARD_PUBLIC_URL` (or `BACKEND_URL`): advertised base URL
    /// - `SWITCHBOARD_CRM_BASE_URL`: upstream base URL
    /// - `SWITCHBOARD_CRM_API_VERSION`: upstream `Version` header
    /// - `SWITCHBOARD_CRM_TIMEOUT_SECS`: upstream timeout (default: 30)
    /// - `SWITCHBOARD_TENANT_CACHE_TTL_SECS`: cache TTL (default: 300)
    /// - `SWITCHBOARD_STORE`: "postgres" or "memory" (default: postgres)
    /// - `SWITCHBOARD_TENANTS_FILE`: seed file for the memory store
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let webhook_token = env_first(&["SWITCHBOARD_WEBHOOK_TOKEN", "VAPI_WEBHOOK_TOKEN"])
            .map(|t| SecretString::new(t.into()));

        let public_base_url = env_first(&["SWITCHBOARD_PUBLIC_URL", "BACKEND_URL"])
            .map(|u| trim_base_url(&u))
            .unwrap_or(defaults.public_base_url);

        let crm_base_url = std::env::var("SWITCHBOARD_CRM_BASE_URL")
            .ok()
            .map(|u| trim_base_url(&u))
            .unwrap_or(defaults.crm_base_url);

        let crm_api_version = std::env::var("SWITCHBOARD_CRM_API_VERSION")
            .unwrap_or(defaults.crm_api_version);

        let crm_timeout = std::env::var("SWITCHBOARD_CRM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.crm_timeout);

        let tenant_cache_ttl = std::env::var("SWITCHBOARD_TENANT_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.tenant_cache_ttl);

        let store = std::env::var("SWITCHBOARD_STORE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let tenants_file = std::env::var("SWITCHBOARD_TENANTS_FILE").ok();

        Self {
            webhook_token,
            public_base_url,
            crm_base_url,
            crm_api_version,
            crm_timeout,
            tenant_cache_ttl,
            store,
            tenants_file,
        }
    }

    /// Whether the webhook gate is enforcing a token.
    pub fn webhook_auth_enabled(&self) -> bool {
        self.webhook_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

/// First of `keys` that is set to a non-empty value.
fn env_first(keys: &[&str]) -> Option<String> {
    first_non_empty(keys, |key| std::env::var(key).ok())
}

fn first_non_empty(keys: &[&str], lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    keys.iter()
        .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert!(config.webhook_token.is_none());
        assert!(!config.webhook_auth_enabled());
        assert_eq!(config.crm_base_url, DEFAULT_CRM_BASE_URL);
        assert_eq!(config.crm_api_version, "2021-07-28");
        assert_eq!(config.tenant_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.store, StoreKind::Postgres);
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().ok(), Some(StoreKind::Memory));
        assert_eq!("MEM".parse::<StoreKind>().ok(), Some(StoreKind::Memory));
        assert_eq!("postgres".parse::<StoreKind>().ok(), Some(StoreKind::Postgres));
        assert_eq!("anything".parse::<StoreKind>().ok(), Some(StoreKind::Postgres));
    }

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("https://relay.example.com/ "), "https://relay.example.com");
        assert_eq!(trim_base_url("http://localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn test_webhook_auth_enabled_with_token() {
        let config = RelayConfig {
            webhook_token: Some(SecretString::new("s3cret".to_string().into())),
            ..RelayConfig::default()
        };
        assert!(config.webhook_auth_enabled());
    }

    #[test]
    fn test_empty_primary_falls_back_to_legacy_variable() {
        let env: std::collections::HashMap<&str, &str> = [
            ("SWITCHBOARD_WEBHOOK_TOKEN", ""),
            ("VAPI_WEBHOOK_TOKEN", "legacy-secret"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        assert_eq!(
            first_non_empty(&["SWITCHBOARD_WEBHOOK_TOKEN", "VAPI_WEBHOOK_TOKEN"], lookup),
            Some("legacy-secret".to_string())
        );
        assert_eq!(first_non_empty(&["SWITCHBOARD_WEBHOOK_TOKEN"], lookup), None);
        assert_eq!(first_non_empty(&["UNSET"], lookup), None);
    }
}
