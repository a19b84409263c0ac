//! Error Types for the Switchboard API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON: `{"code", "message", "details"?}`.
//! Upstream errors keep the upstream status code instead of being remapped.
//! Internal errors are logged in full and returned with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use switchboard_core::SwitchboardError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Authorization header absent or not a bearer token
    Unauthorized,

    /// Bearer token did not match
    InvalidToken,

    // ========================================================================
    // Client Input Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field format is incorrect
    InvalidFormat,

    /// Tenant exists but lacks the CRM credential the operation needs
    MissingCredentials,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No tenant for the given phone number or ID
    TenantNotFound,

    /// No call session for the given call ID
    SessionNotFound,

    // ========================================================================
    // Upstream Errors (status passed through)
    // ========================================================================
    /// The CRM/calendar call failed or returned non-success
    UpstreamError,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Datastore operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,

            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat
            | ErrorCode::MissingCredentials => StatusCode::BAD_REQUEST,

            ErrorCode::TenantNotFound | ErrorCode::SessionNotFound => StatusCode::NOT_FOUND,

            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Missing or invalid Authorization header",
            ErrorCode::InvalidToken => "Invalid token",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::MissingCredentials => "Missing CRM credentials for this client",
            ErrorCode::TenantNotFound => "Client not found",
            ErrorCode::SessionNotFound => "Session not found",
            ErrorCode::UpstreamError => "Upstream request failed",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }

    /// Whether the message must be hidden from the caller.
    fn is_internal(&self) -> bool {
        matches!(self, ErrorCode::InternalError | ErrorCode::DatabaseError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (upstream body, offending field, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Upstream status to pass through instead of the code's default.
    #[serde(skip)]
    pub upstream_status: Option<u16>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            upstream_status: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.upstream_status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or_else(|| self.code.status_code())
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create an InvalidToken error.
    pub fn invalid_token() -> Self {
        Self::from_code(ErrorCode::InvalidToken)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create a MissingField error naming several alternatives/fields at once.
    pub fn missing_fields(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingField, message)
    }

    /// Create an InvalidFormat error.
    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    /// Create a MissingCredentials error.
    pub fn missing_credentials(tenant: impl fmt::Display, field: &str) -> Self {
        Self::new(
            ErrorCode::MissingCredentials,
            format!("Client {} is missing '{}'", tenant, field),
        )
    }

    /// Create a TenantNotFound error.
    pub fn tenant_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TenantNotFound,
            format!("Client not found for {}", key),
        )
    }

    /// Create a SessionNotFound error.
    pub fn session_not_found(call_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SessionNotFound,
            format!("Session {} not found", call_id),
        )
    }

    /// Create an UpstreamError that carries the upstream status and body.
    pub fn upstream(status: u16, message: impl Into<String>, body: serde_json::Value) -> Self {
        let mut err = Self::new(ErrorCode::UpstreamError, message).with_details(body);
        err.upstream_status = Some(status);
        err
    }

    /// Create an UpstreamError for a call that never produced a response.
    pub fn upstream_unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamError, message)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a DatabaseError.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError so handlers can return `ApiResult<T>`.
///
/// Internal and database errors are logged here, at the outermost boundary,
/// and their message is replaced by the generic default.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.code.is_internal() {
            tracing::error!(code = %self.code, message = %self.message, "Request failed");
            ApiError::from_code(self.code)
        } else {
            self
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM OTHER ERRORS
// ============================================================================

impl From<SwitchboardError> for ApiError {
    fn from(err: SwitchboardError) -> Self {
        match err {
            SwitchboardError::MissingField { field } => ApiError::missing_field(&field),
            SwitchboardError::InvalidValue { field, reason } => {
                ApiError::invalid_input(format!("Invalid value for '{}': {}", field, reason))
            }
            SwitchboardError::MissingCredential { tenant, field } => {
                ApiError::missing_credentials(tenant, field)
            }
            SwitchboardError::TenantNotFound { key } => ApiError::tenant_not_found(key),
            SwitchboardError::SessionNotFound { call_id } => ApiError::session_not_found(call_id),
            SwitchboardError::Storage { reason } => ApiError::database_error(reason),
        }
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
