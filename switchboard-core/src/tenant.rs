//! Tenant records and the CRM credentials they carry.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{SwitchboardError, SwitchboardResult};

/// Timezone assumed when a tenant has none configured.
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

// ============================================================================
// TENANT ID
// ============================================================================

/// Opaque tenant identifier as stored in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// BEARER TOKEN (TYPE-SAFE)
// ============================================================================

/// Upstream CRM bearer token.
///
/// Wrapped in `secrecy` so it never ends up in logs or `Debug` output.
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self(SecretString::new(token.into()))
    }

    /// Expose the raw token (only for building the Authorization header).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for BearerToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(BearerToken::new)
    }
}

// ============================================================================
// TENANT RECORD
// ============================================================================

/// One configured business of the relay.
///
/// Field aliases match the column names of the existing `clients` table so the
/// same JSON can seed the in-memory directory.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantRecord {
    pub id: TenantId,
    #[serde(alias = "twilio_number")]
    pub phone_number: String,
    #[serde(default, alias = "ghl_token")]
    pub crm_token: Option<BearerToken>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default, alias = "client_name")]
    pub display_name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Token + location pair required by most upstream endpoints.
#[derive(Debug, Clone)]
pub struct CrmCredentials {
    pub token: BearerToken,
    pub location_id: String,
}

impl TenantRecord {
    /// Bearer token, or a client-input error when the tenant has none.
    pub fn bearer_token(&self) -> SwitchboardResult<&BearerToken> {
        self.crm_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.missing("crm_token"))
    }

    pub fn location(&self) -> SwitchboardResult<&str> {
        non_empty(self.location_id.as_deref()).ok_or_else(|| self.missing("location_id"))
    }

    pub fn calendar(&self) -> SwitchboardResult<&str> {
        non_empty(self.calendar_id.as_deref()).ok_or_else(|| self.missing("calendar_id"))
    }

    /// Token and location together.
    pub fn credentials(&self) -> SwitchboardResult<CrmCredentials> {
        Ok(CrmCredentials {
            token: self.bearer_token()?.clone(),
            location_id: self.location()?.to_string(),
        })
    }

    /// Configured timezone name, falling back to [`DEFAULT_TIMEZONE`].
    pub fn timezone_or_default(&self) -> &str {
        non_empty(self.timezone.as_deref()).unwrap_or(DEFAULT_TIMEZONE)
    }

    fn missing(&self, field: &'static str) -> SwitchboardError {
        SwitchboardError::MissingCredential {
            tenant: self.id.to_string(),
            field,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
