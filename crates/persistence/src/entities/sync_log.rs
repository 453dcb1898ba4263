//! Sync log entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{EntityType, SyncDirection, SyncLog, SyncLogStatus};

/// Database row mapping for the sync_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct SyncLogEntity {
    pub id: i64,
    pub run_id: Uuid,
    pub integration_id: i64,
    pub operation: String,
    pub entity_type: String,
    pub direction: String,
    pub status: String,
    pub records_processed: i32,
    pub records_successful: i32,
    pub records_failed: i32,
    pub error_message: Option<String>,
    pub details: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncLogEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> SyncLog {
        let entity_type = self
            .entity_type
            .parse::<EntityType>()
            .unwrap_or(EntityType::Client);

        let direction = self
            .direction
            .parse::<SyncDirection>()
            .unwrap_or(SyncDirection::Import);

        let status = self
            .status
            .parse::<SyncLogStatus>()
            .unwrap_or(SyncLogStatus::Failed);

        SyncLog {
            id: self.id,
            run_id: self.run_id,
            integration_id: self.integration_id,
            operation: self.operation,
            entity_type,
            direction,
            status,
            records_processed: self.records_processed,
            records_successful: self.records_successful,
            records_failed: self.records_failed,
            error_message: self.error_message,
            details: self.details,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

impl From<SyncLogEntity> for SyncLog {
    fn from(entity: SyncLogEntity) -> Self {
        entity.into_domain()
    }
}
