//! Sync queue domain model.
//!
//! Queue items are durable requests to run a sync asynchronously. The queue
//! processor moves each item through `pending → processing → completed|failed`,
//! returning it to `pending` with a fixed backoff while attempts remain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::sync::SyncDirection;

/// Fixed delay before a failed item is retried.
pub const RETRY_BACKOFF_SECS: i64 = 300;

/// Attempts allowed when the request does not specify a bound.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Returns the fixed retry backoff.
pub fn retry_backoff() -> Duration {
    Duration::seconds(RETRY_BACKOFF_SECS)
}

/// Status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            _ => Err(format!(
                "Invalid queue status: {}. Must be one of: pending, processing, completed, failed",
                s
            )),
        }
    }
}

/// Operations a queue item can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    SyncClients,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::SyncClients => "sync_clients",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync_clients" => Ok(SyncOperation::SyncClients),
            _ => Err(format!("Unknown sync operation: {}", s)),
        }
    }
}

/// A pending asynchronous sync request.
///
/// `operation` is kept as stored text so that rows with an unknown operation
/// can still be loaded and failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncQueueItem {
    pub id: i64,
    pub integration_id: i64,
    pub operation: String,
    pub direction: SyncDirection,
    pub status: QueueStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Token of the worker holding the item while it is processing.
    #[serde(skip)]
    pub claim_token: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Refreshed by the worker's heartbeat while processing.
    pub updated_at: DateTime<Utc>,
}

impl SyncQueueItem {
    /// Whether the item may be claimed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Pending && self.scheduled_at <= now
    }
}

/// Data required to enqueue a sync request.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub integration_id: i64,
    pub operation: String,
    pub direction: SyncDirection,
    pub max_attempts: i32,
    /// Earliest time the item may run; now when absent.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewQueueItem {
    pub fn new(integration_id: i64, operation: SyncOperation, direction: SyncDirection) -> Self {
        Self {
            integration_id,
            operation: operation.as_str().to_string(),
            direction,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scheduled_at: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

fn default_operation() -> SyncOperation {
    SyncOperation::SyncClients
}

/// Request payload for enqueueing a sync.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct EnqueueSyncRequest {
    #[serde(default = "default_operation")]
    pub operation: SyncOperation,

    pub direction: SyncDirection,

    #[validate(range(min = 1, max = 10, message = "max_attempts must be between 1 and 10"))]
    pub max_attempts: Option<i32>,

    pub scheduled_at: Option<DateTime<Utc>>,
}

impl EnqueueSyncRequest {
    pub fn into_new_item(self, integration_id: i64) -> NewQueueItem {
        NewQueueItem {
            integration_id,
            operation: self.operation.as_str().to_string(),
            direction: self.direction,
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            scheduled_at: self.scheduled_at,
        }
    }
}
