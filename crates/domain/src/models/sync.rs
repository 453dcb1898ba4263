//! Core synchronization types shared by the engine, mappers and stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use super::client::ClientInput;

// ============================================================================
// Entity Type
// ============================================================================

/// Kind of business entity that can be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Client,
}

impl EntityType {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Client => "client",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(EntityType::Client),
            _ => Err(format!("Invalid entity type: {}. Must be one of: client", s)),
        }
    }
}

// ============================================================================
// Sync Direction
// ============================================================================

/// Direction of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// External system into local storage.
    Import,
    /// Local storage into the external system.
    Export,
}

impl SyncDirection {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Import => "import",
            SyncDirection::Export => "export",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(SyncDirection::Import),
            "export" => Ok(SyncDirection::Export),
            _ => Err(format!(
                "Invalid sync direction: {}. Must be one of: import, export",
                s
            )),
        }
    }
}

// ============================================================================
// Local entities
// ============================================================================

/// Local-shaped entity payload, without storage identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EntityData {
    Client(ClientInput),
}

impl EntityData {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityData::Client(_) => EntityType::Client,
        }
    }
}

/// A stored local entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntity {
    pub id: i64,
    pub data: EntityData,
}

/// Filter passed to an adapter when listing external records.
#[derive(Debug, Clone)]
pub struct ListFilter {
    /// Only records modified at or after this instant, when the system supports it.
    pub modified_since: Option<DateTime<Utc>>,
    /// Whether soft-deleted records are returned.
    pub include_deleted: bool,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            modified_since: None,
            include_deleted: true,
        }
    }
}

// ============================================================================
// Sync Result
// ============================================================================

/// Outcome of a single record within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Outcome of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub records_processed: i32,
    pub records_successful: i32,
    pub records_failed: i32,
    pub records_created: i32,
    pub records_updated: i32,
    pub records_unchanged: i32,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SyncResult {
    /// Creates an empty result for a batch of `processed` records.
    pub fn for_batch(processed: usize) -> Self {
        Self {
            records_processed: processed as i32,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        self.records_successful += 1;
        match outcome {
            RecordOutcome::Created => self.records_created += 1,
            RecordOutcome::Updated => self.records_updated += 1,
            RecordOutcome::Unchanged => self.records_unchanged += 1,
        }
    }

    /// Records a per-record failure as `"<entity_id>: <message>"`.
    pub fn record_failure(&mut self, entity_id: &str, message: impl fmt::Display) {
        self.records_failed += 1;
        self.errors.push(format!("{}: {}", entity_id, message));
    }

    /// Computes the success flag and the structured details payload.
    pub fn finish(mut self, entity_type: EntityType, direction: SyncDirection) -> Self {
        self.success = self.records_failed == 0;
        self.details = Some(json!({
            "entity_type": entity_type.as_str(),
            "direction": direction.as_str(),
            "created": self.records_created,
            "updated": self.records_updated,
            "unchanged": self.records_unchanged,
        }));
        self
    }

    /// Returns the first `limit` error messages.
    pub fn first_errors(&self, limit: usize) -> &[String] {
        &self.errors[..self.errors.len().min(limit)]
    }

    /// Joins the first `limit` error messages into a single summary line.
    pub fn error_summary(&self, limit: usize) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let mut summary = self.first_errors(limit).join("; ");
        if self.errors.len() > limit {
            summary.push_str(&format!(" (and {} more)", self.errors.len() - limit));
        }
        Some(summary)
    }
}
