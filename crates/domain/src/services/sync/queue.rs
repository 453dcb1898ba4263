//! Queue processor: drains due sync queue items and runs them through the engine.
//!
//! Failed items are retried with a fixed backoff until `max_attempts` is
//! reached. Errors never escape `process_queue`.
//!
//! A worker holds each claimed item under its own token and refreshes it
//! every third of `stale_after`, so only items whose worker stopped are
//! returned to pending.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use super::engine::SyncEngine;
use super::error::SyncError;
use super::ports::SyncQueueStore;
use crate::models::sync_queue::retry_backoff;
use crate::models::{NewQueueItem, SyncOperation, SyncQueueItem};

/// Tuning for the queue processor.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Items fetched per round.
    pub batch_size: i64,
    /// Items processed at the same time.
    pub max_concurrency: usize,
    /// Items not refreshed by their worker for this long are returned to
    /// pending.
    pub stale_after: Duration,
}

impl QueueSettings {
    /// Period of the heartbeat that keeps a running item from going stale.
    pub fn heartbeat_interval(&self) -> StdDuration {
        (self.stale_after / 3)
            .to_std()
            .unwrap_or(StdDuration::ZERO)
            .max(StdDuration::from_secs(1))
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrency: 4,
            stale_after: Duration::minutes(30),
        }
    }
}

/// Counters for one `process_queue` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueRunStats {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Items another worker claimed first or took over during the run.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Completed,
    Retried,
    Failed,
    Skipped,
}

impl ItemOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Completed => "completed",
            ItemOutcome::Retried => "retried",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Skipped => "skipped",
        }
    }
}

impl QueueRunStats {
    fn add(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Completed => self.completed += 1,
            ItemOutcome::Retried => self.retried += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => {
                self.skipped += 1;
                return;
            }
        }
        self.claimed += 1;
    }
}

/// Runs queued sync requests.
#[derive(Clone)]
pub struct QueueProcessor {
    engine: Arc<SyncEngine>,
    queue: Arc<dyn SyncQueueStore>,
    settings: QueueSettings,
}

impl QueueProcessor {
    /// Create a new queue processor.
    pub fn new(
        engine: Arc<SyncEngine>,
        queue: Arc<dyn SyncQueueStore>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            engine,
            queue,
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Adds a sync request to the queue.
    pub async fn enqueue(&self, item: NewQueueItem) -> Result<SyncQueueItem, SyncError> {
        let queued = self.queue.enqueue(item).await?;
        tracing::info!(
            queue_item_id = queued.id,
            integration_id = queued.integration_id,
            operation = %queued.operation,
            direction = %queued.direction,
            scheduled_at = %queued.scheduled_at,
            "Sync request queued"
        );
        Ok(queued)
    }

    pub async fn get(&self, id: i64) -> Result<Option<SyncQueueItem>, SyncError> {
        self.queue.get(id).await
    }

    /// Processes every item due now.
    pub async fn process_queue(&self) -> QueueRunStats {
        self.process_queue_at(Utc::now()).await
    }

    /// Processes every item due at `now`, using `now` for all timestamps.
    pub async fn process_queue_at(&self, now: DateTime<Utc>) -> QueueRunStats {
        let mut stats = QueueRunStats::default();

        match self
            .queue
            .requeue_stale(now - self.settings.stale_after, now)
            .await
        {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "Returned stale queue items to pending"),
            Err(e) => tracing::error!(error = %e, "Failed to requeue stale items"),
        }

        let mut seen = HashSet::new();
        loop {
            let due = match self.queue.due(now, self.settings.batch_size).await {
                Ok(due) => due,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to fetch due queue items");
                    break;
                }
            };
            let fetched = due.len();
            let batch: Vec<SyncQueueItem> =
                due.into_iter().filter(|item| seen.insert(item.id)).collect();
            if batch.is_empty() {
                break;
            }

            self.process_batch(batch, now, &mut stats).await;

            if (fetched as i64) < self.settings.batch_size {
                break;
            }
        }

        if stats.claimed > 0 || stats.skipped > 0 {
            tracing::info!(
                claimed = stats.claimed,
                completed = stats.completed,
                retried = stats.retried,
                failed = stats.failed,
                skipped = stats.skipped,
                "Sync queue processed"
            );
        }
        stats
    }

    async fn process_batch(
        &self,
        batch: Vec<SyncQueueItem>,
        now: DateTime<Utc>,
        stats: &mut QueueRunStats,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for item in batch {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let processor = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                processor.process_item(item, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    counter!("sync_queue_items_total", "outcome" => outcome.as_str()).increment(1);
                    stats.add(outcome);
                }
                Err(e) => tracing::error!(error = %e, "Queue item task panicked"),
            }
        }
    }

    async fn process_item(&self, item: SyncQueueItem, now: DateTime<Utc>) -> ItemOutcome {
        let span = tracing::info_span!(
            "queue_item",
            queue_item_id = item.id,
            integration_id = item.integration_id,
            operation = %item.operation,
        );
        self.process_claimed(item, now).instrument(span).await
    }

    async fn process_claimed(&self, item: SyncQueueItem, now: DateTime<Utc>) -> ItemOutcome {
        let token = Uuid::new_v4();
        let claimed = match self.queue.claim(item.id, token, now).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                tracing::debug!("Queue item already claimed");
                return ItemOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim queue item");
                return ItemOutcome::Skipped;
            }
        };

        let run = self
            .with_heartbeat(claimed.id, token, now, self.dispatch(&claimed))
            .await;
        let outcome = match run {
            Ok(()) => self
                .queue
                .complete(claimed.id, token, now)
                .await
                .map(|held| (held, ItemOutcome::Completed)),
            Err(err) => self.record_failure(&claimed, token, &err, now).await,
        };

        match outcome {
            Ok((true, outcome)) => outcome,
            Ok((false, _)) => {
                tracing::warn!("Queue item was taken over by another worker; outcome discarded");
                ItemOutcome::Skipped
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to update queue item; it will be requeued when stale"
                );
                ItemOutcome::Failed
            }
        }
    }

    /// Drives `run` while refreshing the claim of item `id`.
    ///
    /// Heartbeats are stamped with `now` plus the time elapsed since the run
    /// started.
    async fn with_heartbeat<F, T>(&self, id: i64, token: Uuid, now: DateTime<Utc>, run: F) -> T
    where
        F: Future<Output = T>,
    {
        let period = self.settings.heartbeat_interval();
        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval_at(started + period, period);
        tokio::pin!(run);

        loop {
            tokio::select! {
                output = &mut run => return output,
                _ = ticker.tick() => {
                    let elapsed = Duration::from_std(started.elapsed())
                        .unwrap_or_else(|_| Duration::zero());
                    match self.queue.heartbeat(id, token, now + elapsed).await {
                        Ok(true) => tracing::trace!("Queue item heartbeat"),
                        Ok(false) => tracing::warn!("Queue item claim lost while running"),
                        Err(e) => tracing::warn!(error = %e, "Failed to refresh queue item"),
                    }
                }
            }
        }
    }

    async fn dispatch(&self, item: &SyncQueueItem) -> Result<(), SyncError> {
        let operation: SyncOperation = item
            .operation
            .parse()
            .map_err(|_| SyncError::UnknownOperation(item.operation.clone()))?;

        let result = match operation {
            SyncOperation::SyncClients => {
                self.engine
                    .sync_clients(item.integration_id, item.direction)
                    .await?
            }
        };

        if result.success {
            Ok(())
        } else {
            Err(SyncError::RecordsFailed {
                failed: result.records_failed,
                processed: result.records_processed,
            })
        }
    }

    /// Records a failed run. The flag is false when the claim was lost.
    async fn record_failure(
        &self,
        item: &SyncQueueItem,
        token: Uuid,
        err: &SyncError,
        now: DateTime<Utc>,
    ) -> Result<(bool, ItemOutcome), SyncError> {
        let attempts = item.attempts + 1;
        let message = err.to_string();

        if err.is_retryable() && attempts < item.max_attempts {
            let next_at = now + retry_backoff();
            tracing::warn!(
                attempts,
                max_attempts = item.max_attempts,
                next_at = %next_at,
                error = %message,
                "Queue item failed, retry scheduled"
            );
            let held = self
                .queue
                .reschedule(item.id, token, attempts, next_at, &message, now)
                .await?;
            Ok((held, ItemOutcome::Retried))
        } else {
            tracing::error!(
                attempts,
                max_attempts = item.max_attempts,
                error = %message,
                "Queue item failed permanently"
            );
            let held = self
                .queue
                .fail(item.id, token, attempts, &message, now)
                .await?;
            Ok((held, ItemOutcome::Failed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClientInput, Credentials, IntegrationKind, IntegrationOptions, NewIntegration,
        QueueStatus, SyncDirection, DEFAULT_MAX_ATTEMPTS, RETRY_BACKOFF_SECS,
    };
    use crate::services::sync::memory::{
        InMemoryClientStore, InMemoryIntegrationStore, InMemoryMappingStore,
        InMemorySyncLogStore, InMemorySyncQueueStore, MockAdapter, MockAdapterFactory,
        MockFailure,
    };
    use crate::models::{EntityType, IntegrationConfig, ListFilter};
    use crate::services::sync::error::AdapterError;
    use crate::services::sync::ports::{
        AdapterFactory, ExternalSystemAdapter, IntegrationConfigStore,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn one_c_integration() -> NewIntegration {
        NewIntegration {
            name: "Accounting".to_string(),
            kind: IntegrationKind::OneC,
            base_url: "https://1c.example.com".to_string(),
            credentials: Credentials::default(),
            options: IntegrationOptions::default(),
            is_active: true,
        }
    }

    /// Holds every listing until released and counts overlapping runs.
    #[derive(Default)]
    struct GatedAdapter {
        entered: Notify,
        release: Notify,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ExternalSystemAdapter for GatedAdapter {
        fn kind(&self) -> IntegrationKind {
            IntegrationKind::OneC
        }

        async fn list_entities(
            &self,
            _entity_type: EntityType,
            _filter: &ListFilter,
        ) -> Result<Vec<Value>, AdapterError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn create_entity(
            &self,
            _entity_type: EntityType,
            _record: &Value,
        ) -> Result<String, AdapterError> {
            Ok("ext-1".to_string())
        }

        async fn update_entity(
            &self,
            _entity_type: EntityType,
            _external_id: &str,
            _record: &Value,
        ) -> Result<bool, AdapterError> {
            Ok(true)
        }

        async fn test_connection(&self) -> bool {
            true
        }
    }

    struct GatedFactory(Arc<GatedAdapter>);

    impl AdapterFactory for GatedFactory {
        fn build(
            &self,
            _config: &IntegrationConfig,
        ) -> Result<Arc<dyn ExternalSystemAdapter>, SyncError> {
            Ok(self.0.clone())
        }
    }

    async fn gated_processor() -> (
        QueueProcessor,
        Arc<InMemorySyncQueueStore>,
        Arc<GatedAdapter>,
        i64,
    ) {
        let integrations = Arc::new(InMemoryIntegrationStore::new());
        let integration = integrations.create(one_c_integration()).await.unwrap();
        let adapter = Arc::new(GatedAdapter::default());
        let queue = Arc::new(InMemorySyncQueueStore::new());

        let engine = Arc::new(SyncEngine::new(
            integrations,
            Arc::new(InMemoryClientStore::new()),
            Arc::new(InMemoryMappingStore::new()),
            Arc::new(InMemorySyncLogStore::new()),
            Arc::new(GatedFactory(adapter.clone())),
        ));
        let processor = QueueProcessor::new(engine, queue.clone(), QueueSettings::default());
        (processor, queue, adapter, integration.id)
    }

    struct Harness {
        processor: QueueProcessor,
        queue: Arc<InMemorySyncQueueStore>,
        clients: Arc<InMemoryClientStore>,
        logs: Arc<InMemorySyncLogStore>,
        adapter: Arc<MockAdapter>,
        integration_id: i64,
    }

    async fn harness() -> Harness {
        let integrations = Arc::new(InMemoryIntegrationStore::new());
        let clients = Arc::new(InMemoryClientStore::new());
        let logs = Arc::new(InMemorySyncLogStore::new());
        let queue = Arc::new(InMemorySyncQueueStore::new());
        let adapter = Arc::new(MockAdapter::new(IntegrationKind::OneC).with_records(vec![
            json!({"Ref_Key": "ref-1", "Description": "Romashka"}),
        ]));

        let integration = integrations.create(one_c_integration()).await.unwrap();

        let engine = Arc::new(SyncEngine::new(
            integrations,
            clients.clone(),
            Arc::new(InMemoryMappingStore::new()),
            logs.clone(),
            Arc::new(MockAdapterFactory::new(adapter.clone())),
        ));

        Harness {
            processor: QueueProcessor::new(engine, queue.clone(), QueueSettings::default()),
            queue,
            clients,
            logs,
            adapter,
            integration_id: integration.id,
        }
    }

    fn item(integration_id: i64, direction: SyncDirection) -> NewQueueItem {
        NewQueueItem::new(integration_id, SyncOperation::SyncClients, direction)
    }

    #[tokio::test]
    async fn test_successful_item_completes() {
        let h = harness().await;
        let queued = h
            .processor
            .enqueue(item(h.integration_id, SyncDirection::Import))
            .await
            .unwrap();

        let stats = h.processor.process_queue().await;

        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.completed, 1);
        let stored = h.queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Completed);
        assert_eq!(stored.attempts, 0);
        assert!(stored.processed_at.is_some());
        assert_eq!(h.clients.len(), 1);
        assert_eq!(h.logs.all().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_bound_and_fixed_backoff() {
        let h = harness().await;
        h.adapter.fail_list(MockFailure::Connectivity);
        let t0 = Utc::now();
        let queued = h
            .processor
            .enqueue(item(h.integration_id, SyncDirection::Import).scheduled_at(t0))
            .await
            .unwrap();
        assert_eq!(queued.max_attempts, DEFAULT_MAX_ATTEMPTS);

        let backoff = Duration::seconds(RETRY_BACKOFF_SECS);
        let mut now = t0;
        let mut schedules = vec![queued.scheduled_at];

        for attempt in 1..DEFAULT_MAX_ATTEMPTS {
            let stats = h.processor.process_queue_at(now).await;
            assert_eq!(stats.retried, 1);

            let stored = h.queue.get(queued.id).await.unwrap().unwrap();
            assert_eq!(stored.status, QueueStatus::Pending);
            assert_eq!(stored.attempts, attempt);
            assert_eq!(stored.scheduled_at, now + backoff);
            assert!(stored.last_error.as_deref().unwrap().contains("timed out"));
            schedules.push(stored.scheduled_at);

            // Not due again before the backoff elapses
            let early = h.processor.process_queue_at(now + Duration::seconds(299)).await;
            assert_eq!(early.claimed, 0);

            now = stored.scheduled_at;
        }

        let stats = h.processor.process_queue_at(now).await;
        assert_eq!(stats.failed, 1);
        let stored = h.queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Failed);
        assert_eq!(stored.attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(schedules.windows(2).all(|w| w[0] < w[1]));

        // Nothing is picked up after the final failure
        let later = h.processor.process_queue_at(now + Duration::hours(1)).await;
        assert_eq!(later, QueueRunStats::default());
        assert_eq!(h.logs.all().len(), DEFAULT_MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_unknown_operation_fails_without_retry() {
        let h = harness().await;
        let queued = h
            .processor
            .enqueue(NewQueueItem {
                integration_id: h.integration_id,
                operation: "sync_orders".to_string(),
                direction: SyncDirection::Import,
                max_attempts: 3,
                scheduled_at: None,
            })
            .await
            .unwrap();

        let stats = h.processor.process_queue().await;

        assert_eq!(stats.failed, 1);
        let stored = h.queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Failed);
        assert_eq!(stored.attempts, 1);
        assert!(stored.last_error.unwrap().contains("sync_orders"));
        assert!(h.logs.all().is_empty());
    }

    #[tokio::test]
    async fn test_missing_integration_follows_retry_contract() {
        let h = harness().await;
        let now = Utc::now();
        let queued = h
            .processor
            .enqueue(item(404, SyncDirection::Import).scheduled_at(now))
            .await
            .unwrap();

        let stats = h.processor.process_queue_at(now).await;

        assert_eq!(stats.retried, 1);
        let stored = h.queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.scheduled_at, now + retry_backoff());
        assert!(stored.last_error.unwrap().contains("integration 404 not found"));
    }

    #[tokio::test]
    async fn test_partial_failure_is_retried() {
        let h = harness().await;
        h.clients.insert(ClientInput::new("Vasilek"));
        h.adapter.fail_create_call(1, MockFailure::Remote(500));
        let now = Utc::now();
        let queued = h
            .processor
            .enqueue(
                item(h.integration_id, SyncDirection::Export)
                    .with_max_attempts(1)
                    .scheduled_at(now),
            )
            .await
            .unwrap();

        let stats = h.processor.process_queue_at(now).await;

        assert_eq!(stats.failed, 1);
        let stored = h.queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("1 of 1 records failed"));
    }

    #[tokio::test]
    async fn test_future_items_are_not_processed() {
        let h = harness().await;
        let now = Utc::now();
        h.processor
            .enqueue(
                item(h.integration_id, SyncDirection::Import)
                    .scheduled_at(now + Duration::minutes(10)),
            )
            .await
            .unwrap();

        let stats = h.processor.process_queue_at(now).await;
        assert_eq!(stats, QueueRunStats::default());
    }

    #[tokio::test]
    async fn test_concurrent_processors_claim_each_item_once() {
        let h = harness().await;
        let now = Utc::now();
        for _ in 0..5 {
            h.processor
                .enqueue(item(h.integration_id, SyncDirection::Export).scheduled_at(now))
                .await
                .unwrap();
        }

        let other = h.processor.clone();
        let (a, b) = tokio::join!(
            h.processor.process_queue_at(now),
            other.process_queue_at(now)
        );

        assert_eq!(a.claimed + b.claimed, 5);
        assert_eq!(a.completed + b.completed, 5);
        assert!(h
            .queue
            .all()
            .iter()
            .all(|i| i.status == QueueStatus::Completed));
        assert_eq!(h.logs.all().len(), 5);
    }

    #[tokio::test]
    async fn test_stale_processing_items_are_requeued() {
        let h = harness().await;
        let start = Utc::now();
        let queued = h
            .processor
            .enqueue(item(h.integration_id, SyncDirection::Import).scheduled_at(start))
            .await
            .unwrap();
        h.queue.claim(queued.id, Uuid::new_v4(), start).await.unwrap();

        let stats = h.processor.process_queue_at(start + Duration::hours(1)).await;

        assert_eq!(stats.completed, 1);
        let stored = h.queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Completed);
    }

    #[test]
    fn test_heartbeat_interval() {
        assert_eq!(
            QueueSettings::default().heartbeat_interval(),
            StdDuration::from_secs(600)
        );
        let tiny = QueueSettings {
            stale_after: Duration::seconds(1),
            ..QueueSettings::default()
        };
        assert_eq!(tiny.heartbeat_interval(), StdDuration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_run_is_not_requeued_while_heartbeating() {
        let (processor, queue, adapter, integration_id) = gated_processor().await;
        let t0 = Utc::now();
        let queued = processor
            .enqueue(item(integration_id, SyncDirection::Import).scheduled_at(t0))
            .await
            .unwrap();

        let first = tokio::spawn({
            let processor = processor.clone();
            async move { processor.process_queue_at(t0).await }
        });
        adapter.entered.notified().await;

        // The run outlasts stale_after; its heartbeat keeps the claim fresh
        tokio::time::sleep(StdDuration::from_secs(31 * 60)).await;
        let running = queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(running.status, QueueStatus::Processing);
        assert!(running.updated_at >= t0 + Duration::minutes(30));

        let second = processor.process_queue_at(t0 + Duration::minutes(31)).await;
        assert_eq!(second, QueueRunStats::default());

        adapter.release.notify_one();
        let first = first.await.unwrap();

        assert_eq!(first.completed, 1);
        assert_eq!(adapter.runs.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.max_in_flight.load(Ordering::SeqCst), 1);
        let stored = queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Completed);
    }

    #[tokio::test]
    async fn test_outcome_of_lost_claim_is_discarded() {
        let (processor, queue, adapter, integration_id) = gated_processor().await;
        let t0 = Utc::now();
        let queued = processor
            .enqueue(item(integration_id, SyncDirection::Import).scheduled_at(t0))
            .await
            .unwrap();

        let first = tokio::spawn({
            let processor = processor.clone();
            async move { processor.process_queue_at(t0).await }
        });
        adapter.entered.notified().await;

        // Another node declares the item stale and takes it over
        let later = t0 + Duration::hours(1);
        assert_eq!(queue.requeue_stale(later, later).await.unwrap(), 1);
        let other = Uuid::new_v4();
        queue.claim(queued.id, other, later).await.unwrap().unwrap();

        adapter.release.notify_one();
        let first = first.await.unwrap();

        assert_eq!(first.completed, 0);
        assert_eq!(first.skipped, 1);
        let stored = queue.get(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Processing);
        assert_eq!(stored.claim_token, Some(other));
    }
}
