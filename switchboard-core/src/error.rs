//! Error types for Switchboard core operations

use thiserror::Error;

/// Errors raised by the tenant/session layer.
///
/// These never describe upstream CRM failures; those live in the API crate
/// because they carry HTTP status codes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwitchboardError {
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Tenant {tenant} is missing CRM credential '{field}'")]
    MissingCredential { tenant: String, field: &'static str },

    #[error("No tenant found for {key}")]
    TenantNotFound { key: String },

    #[error("No call session found for {call_id}")]
    SessionNotFound { call_id: String },

    #[error("Storage error: {reason}")]
    Storage { reason: String },
}

impl SwitchboardError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage { reason: reason.into() }
    }
}

/// Result alias used across the core crate.
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;
