//! Integration entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{IntegrationConfig, IntegrationKind};

/// Database row mapping for the integrations table.
#[derive(Debug, Clone, FromRow)]
pub struct IntegrationEntity {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub credentials: serde_json::Value,
    pub options: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationEntity {
    /// Convert to domain model.
    ///
    /// Returns `None` for a kind this build does not know; the column check
    /// constraint keeps that from happening in practice.
    pub fn into_domain(self) -> Option<IntegrationConfig> {
        let kind = self.kind.parse::<IntegrationKind>().ok()?;

        Some(IntegrationConfig {
            id: self.id,
            name: self.name,
            kind,
            base_url: self.base_url,
            credentials: serde_json::from_value(self.credentials).unwrap_or_default(),
            options: serde_json::from_value(self.options).unwrap_or_default(),
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
