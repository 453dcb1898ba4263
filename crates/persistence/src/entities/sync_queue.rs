//! Sync queue entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{QueueStatus, SyncDirection, SyncQueueItem};

/// Database row mapping for the sync_queue table.
#[derive(Debug, Clone, FromRow)]
pub struct SyncQueueEntity {
    pub id: i64,
    pub integration_id: i64,
    pub operation: String,
    pub direction: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub scheduled_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub claim_token: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncQueueEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> SyncQueueItem {
        let direction = self
            .direction
            .parse::<SyncDirection>()
            .unwrap_or(SyncDirection::Import);

        let status = self
            .status
            .parse::<QueueStatus>()
            .unwrap_or(QueueStatus::Failed);

        SyncQueueItem {
            id: self.id,
            integration_id: self.integration_id,
            operation: self.operation,
            direction,
            status,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            scheduled_at: self.scheduled_at,
            processed_at: self.processed_at,
            last_error: self.last_error,
            claim_token: self.claim_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<SyncQueueEntity> for SyncQueueItem {
    fn from(entity: SyncQueueEntity) -> Self {
        entity.into_domain()
    }
}
