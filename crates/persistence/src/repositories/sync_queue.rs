//! Sync queue repository for database operations.
//!
//! Claiming is a conditional `UPDATE ... WHERE status = 'pending'`, so only
//! one worker wins the transition to `processing`. The winner's claim token
//! guards its heartbeat and final update, so a worker whose item was requeued
//! as stale cannot overwrite the new owner's outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{NewQueueItem, SyncQueueItem};
use domain::services::{SyncError, SyncQueueStore};

use super::storage_error;
use crate::entities::SyncQueueEntity;
use crate::metrics::QueryTimer;

/// Repository for sync queue database operations.
#[derive(Clone)]
pub struct SyncQueueRepository {
    pool: PgPool,
}

impl SyncQueueRepository {
    /// Creates a new SyncQueueRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending item.
    pub async fn insert(&self, item: &NewQueueItem) -> Result<SyncQueueEntity, sqlx::Error> {
        let timer = QueryTimer::new("enqueue_sync");
        let result = sqlx::query_as::<_, SyncQueueEntity>(
            r#"
            INSERT INTO sync_queue (integration_id, operation, direction, max_attempts, scheduled_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
            RETURNING *
            "#,
        )
        .bind(item.integration_id)
        .bind(&item.operation)
        .bind(item.direction.as_str())
        .bind(item.max_attempts)
        .bind(item.scheduled_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Find item by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<SyncQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_queue_item_by_id");
        let result = sqlx::query_as::<_, SyncQueueEntity>(
            r#"
            SELECT * FROM sync_queue WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Pending items due at `now`, oldest schedule first.
    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SyncQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_due_queue_items");
        let result = sqlx::query_as::<_, SyncQueueEntity>(
            r#"
            SELECT * FROM sync_queue
            WHERE status = 'pending' AND scheduled_at <= $1
            ORDER BY scheduled_at, id
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Move a pending item to processing under `token`. `None` when the row
    /// was not pending.
    pub async fn mark_processing(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncQueueEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_queue_item");
        let result = sqlx::query_as::<_, SyncQueueEntity>(
            r#"
            UPDATE sync_queue
            SET status = 'processing', claim_token = $2, processed_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Refresh `updated_at` of an item still held under `token`.
    pub async fn touch(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("heartbeat_queue_item");
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET updated_at = $3
            WHERE id = $1 AND status = 'processing' AND claim_token = $2
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await;
        Ok(timer.finish(result)?.rows_affected())
    }

    /// Set the terminal or retry state of an item held under `token`.
    #[allow(clippy::too_many_arguments)]
    async fn set_state(
        &self,
        query_name: &'static str,
        id: i64,
        token: Uuid,
        status: &str,
        attempts: Option<i32>,
        scheduled_at: Option<DateTime<Utc>>,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new(query_name);
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                status = $3,
                attempts = COALESCE($4, attempts),
                scheduled_at = COALESCE($5, scheduled_at),
                last_error = $6,
                claim_token = NULL,
                updated_at = $7
            WHERE id = $1 AND status = 'processing' AND claim_token = $2
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(status)
        .bind(attempts)
        .bind(scheduled_at)
        .bind(last_error)
        .bind(now)
        .execute(&self.pool)
        .await;
        Ok(timer.finish(result)?.rows_affected())
    }

    /// Return items whose worker stopped refreshing them to pending.
    pub async fn reset_stale(
        &self,
        before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("requeue_stale_queue_items");
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'pending', claim_token = NULL, updated_at = $2
            WHERE status = 'processing' AND updated_at < $1
            "#,
        )
        .bind(before)
        .bind(now)
        .execute(&self.pool)
        .await;
        Ok(timer.finish(result)?.rows_affected())
    }
}

#[async_trait]
impl SyncQueueStore for SyncQueueRepository {
    async fn enqueue(&self, item: NewQueueItem) -> Result<SyncQueueItem, SyncError> {
        Ok(self.insert(&item).await.map_err(storage_error)?.into())
    }

    async fn get(&self, id: i64) -> Result<Option<SyncQueueItem>, SyncError> {
        Ok(self
            .find_by_id(id)
            .await
            .map_err(storage_error)?
            .map(SyncQueueItem::from))
    }

    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<SyncQueueItem>, SyncError> {
        Ok(self
            .find_due(now, limit)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(SyncQueueItem::from)
            .collect())
    }

    async fn claim(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncQueueItem>, SyncError> {
        Ok(self
            .mark_processing(id, token, now)
            .await
            .map_err(storage_error)?
            .map(SyncQueueItem::from))
    }

    async fn heartbeat(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let rows = self.touch(id, token, now).await.map_err(storage_error)?;
        Ok(rows > 0)
    }

    async fn complete(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let rows = self
            .set_state("complete_queue_item", id, token, "completed", None, None, None, now)
            .await
            .map_err(storage_error)?;
        Ok(rows > 0)
    }

    async fn reschedule(
        &self,
        id: i64,
        token: Uuid,
        attempts: i32,
        next_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let rows = self
            .set_state(
                "reschedule_queue_item",
                id,
                token,
                "pending",
                Some(attempts),
                Some(next_at),
                Some(error),
                now,
            )
            .await
            .map_err(storage_error)?;
        Ok(rows > 0)
    }

    async fn fail(
        &self,
        id: i64,
        token: Uuid,
        attempts: i32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        let rows = self
            .set_state(
                "fail_queue_item",
                id,
                token,
                "failed",
                Some(attempts),
                None,
                Some(error),
                now,
            )
            .await
            .map_err(storage_error)?;
        Ok(rows > 0)
    }

    async fn requeue_stale(
        &self,
        before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, SyncError> {
        self.reset_stale(before, now).await.map_err(storage_error)
    }
}
