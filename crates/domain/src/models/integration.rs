//! Integration (external system connection) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

// ============================================================================
// Integration Kind
// ============================================================================

/// External system type; selects the adapter and entity mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    /// Bitrix24 CRM REST API.
    Bitrix24,
    /// 1C:Enterprise accounting, OData interface.
    OneC,
}

impl IntegrationKind {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Bitrix24 => "bitrix24",
            IntegrationKind::OneC => "one_c",
        }
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IntegrationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bitrix24" => Ok(IntegrationKind::Bitrix24),
            "one_c" => Ok(IntegrationKind::OneC),
            _ => Err(format!(
                "Invalid integration kind: {}. Must be one of: bitrix24, one_c",
                s
            )),
        }
    }
}

// ============================================================================
// Credentials and options
// ============================================================================

/// Stored credentials. Which fields are used depends on the integration kind:
/// Bitrix24 uses the OAuth fields, 1C uses basic auth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    /// Returns a copy with every secret masked; usernames and client ids stay visible.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_deref().map(shared::crypto::mask_secret);
        Self {
            access_token: mask(&self.access_token),
            refresh_token: mask(&self.refresh_token),
            client_id: self.client_id.clone(),
            client_secret: mask(&self.client_secret),
            username: self.username.clone(),
            password: mask(&self.password),
        }
    }

    /// Whether a token refresh can be attempted with these credentials.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Per-system connection options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntegrationOptions {
    /// 1C information base name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Per-call timeout; the configured default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// OAuth token endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_url: Option<String>,
}

// ============================================================================
// Core Model
// ============================================================================

/// One configured connection to an external system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntegrationConfig {
    pub id: i64,
    pub name: String,
    pub kind: IntegrationKind,
    pub base_url: String,
    pub credentials: Credentials,
    pub options: IntegrationOptions,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create an integration.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub name: String,
    pub kind: IntegrationKind,
    pub base_url: String,
    pub credentials: Credentials,
    pub options: IntegrationOptions,
    pub is_active: bool,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

fn default_active() -> bool {
    true
}

/// Request payload for creating an integration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateIntegrationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub kind: IntegrationKind,

    #[validate(length(max = 2048, message = "URL must be at most 2048 characters"))]
    #[validate(custom(function = "shared::validation::validate_base_url"))]
    pub base_url: String,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub options: IntegrationOptions,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl From<CreateIntegrationRequest> for NewIntegration {
    fn from(req: CreateIntegrationRequest) -> Self {
        Self {
            name: req.name,
            kind: req.kind,
            base_url: req.base_url.trim_end_matches('/').to_string(),
            credentials: req.credentials,
            options: req.options,
            is_active: req.is_active,
        }
    }
}

/// Integration as returned by the API, with secrets masked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IntegrationResponse {
    pub id: i64,
    pub name: String,
    pub kind: IntegrationKind,
    pub base_url: String,
    pub credentials: Credentials,
    pub options: IntegrationOptions,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IntegrationConfig> for IntegrationResponse {
    fn from(c: IntegrationConfig) -> Self {
        Self {
            id: c.id,
            name: c.name,
            kind: c.kind,
            base_url: c.base_url,
            credentials: c.credentials.redacted(),
            options: c.options,
            is_active: c.is_active,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
