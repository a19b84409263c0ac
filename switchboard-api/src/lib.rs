//! SWITCHBOARD API - Voice Platform to CRM Relay
//!
//! This crate exposes the HTTP surface of the relay (Axum). Inbound webhook
//! and tool calls from the voice platform are resolved to a tenant, then
//! forwarded to the upstream CRM/calendar API with that tenant's credentials.
//!
//! Tenant and session types, the tenant cache and the storage traits live in
//! `switchboard-core`.

pub mod assistant;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forwarder;
pub mod macros;
pub mod middleware;
pub mod relay;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod upstream;
pub mod webhooks;

// Re-export commonly used types
pub use auth::WebhookAuth;
pub use config::{RelayConfig, StoreKind};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use forwarder::{BookingInput, ContactInput, ContactOutcome, Forwarder};
pub use middleware::webhook_auth_middleware;
pub use resolver::TenantResolver;
pub use routes::create_api_router;
pub use state::AppState;
pub use upstream::{CrmApi, CrmError, LeadConnectorClient, McpReply, UpstreamReply};
pub use webhooks::{EventKind, WebhookDispatcher};
