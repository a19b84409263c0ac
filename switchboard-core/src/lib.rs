//! SWITCHBOARD Core - Tenant and Session Domain Types
//!
//! This crate holds the pieces of the relay that know nothing about HTTP:
//! - Tenant records and the credentials they carry
//! - Call sessions and their open-ended context bag
//! - The short-lived tenant cache (with an injectable clock)
//! - Storage traits for the tenant directory and the session store,
//!   plus in-memory implementations for development and tests

pub mod cache;
pub mod clock;
pub mod directory;
pub mod error;
pub mod memory;
pub mod session;
pub mod tenant;

pub use cache::{TenantCache, DEFAULT_TENANT_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{SessionStore, TenantDirectory};
pub use error::{SwitchboardError, SwitchboardResult};
pub use memory::{InMemorySessionStore, InMemoryTenantDirectory};
pub use session::{CallSession, SessionContext};
pub use tenant::{BearerToken, CrmCredentials, TenantId, TenantRecord};
