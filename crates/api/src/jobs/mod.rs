//! Background job scheduler and job implementations.

mod pool_metrics;
mod scheduler;
mod sync_queue;

pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use sync_queue::SyncQueueJob;
