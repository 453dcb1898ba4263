//! Sync log domain model: the audit record of one sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::sync::{EntityType, SyncDirection, SyncResult};

/// Status of a sync log entry.
///
/// A log is created as `Started` and finalized exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Started,
    Completed,
    Failed,
}

impl SyncLogStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Started => "started",
            SyncLogStatus::Completed => "completed",
            SyncLogStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncLogStatus::Started)
    }
}

impl fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncLogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(SyncLogStatus::Started),
            "completed" => Ok(SyncLogStatus::Completed),
            "failed" => Ok(SyncLogStatus::Failed),
            _ => Err(format!(
                "Invalid sync log status: {}. Must be one of: started, completed, failed",
                s
            )),
        }
    }
}

/// One sync run as recorded in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncLog {
    pub id: i64,
    pub run_id: Uuid,
    pub integration_id: i64,
    pub operation: String,
    pub entity_type: EntityType,
    pub direction: SyncDirection,
    pub status: SyncLogStatus,
    pub records_processed: i32,
    pub records_successful: i32,
    pub records_failed: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Data written when a run starts.
#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub run_id: Uuid,
    pub integration_id: i64,
    pub operation: String,
    pub entity_type: EntityType,
    pub direction: SyncDirection,
}

impl NewSyncLog {
    pub fn new(integration_id: i64, entity_type: EntityType, direction: SyncDirection) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            integration_id,
            operation: format!("sync_{}s", entity_type.as_str()),
            entity_type,
            direction,
        }
    }
}

/// Terminal state written when a run ends.
#[derive(Debug, Clone)]
pub struct SyncLogOutcome {
    pub status: SyncLogStatus,
    pub records_processed: i32,
    pub records_successful: i32,
    pub records_failed: i32,
    pub error_message: Option<String>,
    pub details: Option<serde_json::Value>,
    pub completed_at: DateTime<Utc>,
}

impl SyncLogOutcome {
    /// Outcome of a run that returned a result, possibly with per-record failures.
    pub fn from_result(result: &SyncResult, max_errors: usize) -> Self {
        let mut details = result
            .details
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        if let Some(map) = details.as_object_mut() {
            map.insert(
                "errors".to_string(),
                serde_json::json!(result.first_errors(max_errors)),
            );
        }

        Self {
            status: if result.success {
                SyncLogStatus::Completed
            } else {
                SyncLogStatus::Failed
            },
            records_processed: result.records_processed,
            records_successful: result.records_successful,
            records_failed: result.records_failed,
            error_message: result.error_summary(max_errors),
            details: Some(details),
            completed_at: Utc::now(),
        }
    }

    /// Outcome of a run that aborted with an error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            status: SyncLogStatus::Failed,
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            error_message: Some(message.into()),
            details: None,
            completed_at: Utc::now(),
        }
    }
}
