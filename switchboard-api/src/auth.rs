//! Webhook Bearer Authentication
//!
//! The voice platform signs nothing; it sends a static bearer token with every
//! webhook. This module checks that token:
//! - No expected token configured: every request passes (local development).
//! - Header absent or not `Bearer <token>`: `UNAUTHORIZED`.
//! - Token mismatch: `INVALID_TOKEN`. Equal-length tokens are compared in
//!   constant time; a length mismatch is rejected before comparing.

use secrecy::{ExposeSecret, SecretString};

use crate::config::RelayConfig;
use crate::error::{ApiError, ApiResult};

/// Expected webhook token, if any.
#[derive(Debug, Clone, Default)]
pub struct WebhookAuth {
    expected: Option<SecretString>,
}

impl WebhookAuth {
    /// Gate that enforces `token`. An empty token leaves the gate open.
    pub fn with_token(token: impl Into<String>) -> Self {
        let token: String = token.into();
        if token.is_empty() {
            return Self::disabled();
        }
        Self {
            expected: Some(SecretString::new(token.into())),
        }
    }

    /// Gate that lets every request through.
    pub fn disabled() -> Self {
        Self { expected: None }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        let auth = match &config.webhook_token {
            Some(token) => Self::with_token(token.expose_secret()),
            None => Self::disabled(),
        };
        if !auth.is_enabled() {
            tracing::warn!("No webhook token configured; /webhooks accepts unauthenticated requests");
        }
        auth
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    /// Check the raw `Authorization` header value.
    pub fn authenticate(&self, auth_header: Option<&str>) -> ApiResult<()> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };

        let presented = auth_header
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid Authorization header"))?;

        if constant_time_eq(presented.as_bytes(), expected.expose_secret().as_bytes()) {
            Ok(())
        } else {
            Err(ApiError::invalid_token())
        }
    }
}

/// Constant-time byte comparison for equal-length inputs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
