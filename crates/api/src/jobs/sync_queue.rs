//! Background job that drains the sync queue.

use domain::services::QueueProcessor;

use super::scheduler::{Job, JobFrequency};

/// Runs due queued sync requests on every tick.
pub struct SyncQueueJob {
    processor: QueueProcessor,
    interval_secs: u64,
}

impl SyncQueueJob {
    pub fn new(processor: QueueProcessor, interval_secs: u64) -> Self {
        Self {
            processor,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for SyncQueueJob {
    fn name(&self) -> &'static str {
        "sync_queue"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    /// Items left pending across a restart are picked up right away.
    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        // Item failures are recorded on the items themselves
        self.processor.process_queue().await;
        Ok(())
    }
}
