//! Sync log repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::{NewSyncLog, SyncLog, SyncLogOutcome};
use domain::services::{SyncError, SyncLogStore};

use super::storage_error;
use crate::entities::SyncLogEntity;
use crate::metrics::QueryTimer;

/// Repository for sync log database operations.
#[derive(Clone)]
pub struct SyncLogRepository {
    pool: PgPool,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a log in `started` status.
    pub async fn insert_started(&self, log: &NewSyncLog) -> Result<SyncLogEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_sync_log");
        let result = sqlx::query_as::<_, SyncLogEntity>(
            r#"
            INSERT INTO sync_logs (run_id, integration_id, operation, entity_type, direction, status)
            VALUES ($1, $2, $3, $4, $5, 'started')
            RETURNING *
            "#,
        )
        .bind(log.run_id)
        .bind(log.integration_id)
        .bind(&log.operation)
        .bind(log.entity_type.as_str())
        .bind(log.direction.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Write the terminal state of a log that is still `started`.
    pub async fn update_finished(
        &self,
        id: i64,
        outcome: &SyncLogOutcome,
    ) -> Result<Option<SyncLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("finish_sync_log");
        let result = sqlx::query_as::<_, SyncLogEntity>(
            r#"
            UPDATE sync_logs SET
                status = $2,
                records_processed = $3,
                records_successful = $4,
                records_failed = $5,
                error_message = $6,
                details = $7,
                completed_at = $8
            WHERE id = $1 AND status = 'started'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(outcome.status.as_str())
        .bind(outcome.records_processed)
        .bind(outcome.records_successful)
        .bind(outcome.records_failed)
        .bind(&outcome.error_message)
        .bind(&outcome.details)
        .bind(outcome.completed_at)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Find log by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<SyncLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_sync_log_by_id");
        let result = sqlx::query_as::<_, SyncLogEntity>(
            r#"
            SELECT * FROM sync_logs WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// List logs for an integration, newest first.
    pub async fn find_by_integration(
        &self,
        integration_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SyncLogEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_sync_logs_by_integration");
        let result = sqlx::query_as::<_, SyncLogEntity>(
            r#"
            SELECT * FROM sync_logs
            WHERE integration_id = $1
            ORDER BY started_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(integration_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }
}

#[async_trait]
impl SyncLogStore for SyncLogRepository {
    async fn start(&self, log: NewSyncLog) -> Result<SyncLog, SyncError> {
        Ok(self
            .insert_started(&log)
            .await
            .map_err(storage_error)?
            .into())
    }

    async fn finish(&self, id: i64, outcome: SyncLogOutcome) -> Result<SyncLog, SyncError> {
        self.update_finished(id, &outcome)
            .await
            .map_err(storage_error)?
            .map(SyncLog::from)
            .ok_or_else(|| SyncError::NotFound(format!("open sync log {}", id)))
    }

    async fn get(&self, id: i64) -> Result<Option<SyncLog>, SyncError> {
        Ok(self
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .map(SyncLog::from))
    }

    async fn list_by_integration(
        &self,
        integration_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SyncLog>, SyncError> {
        Ok(self
            .find_by_integration(integration_id, limit, offset)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(SyncLog::from)
            .collect())
    }
}
