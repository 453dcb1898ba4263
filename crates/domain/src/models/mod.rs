//! Domain models for ERP sync.

pub mod client;
pub mod entity_mapping;
pub mod integration;
pub mod sync;
pub mod sync_log;
pub mod sync_queue;

pub use client::{Client, ClientInput};
pub use entity_mapping::{EntityMapping, NewEntityMapping};
pub use integration::{
    CreateIntegrationRequest, Credentials, IntegrationConfig, IntegrationKind,
    IntegrationOptions, IntegrationResponse, NewIntegration,
};
pub use sync::{EntityData, EntityType, ListFilter, LocalEntity, SyncDirection, SyncResult};
pub use sync_log::{NewSyncLog, SyncLog, SyncLogOutcome, SyncLogStatus};
pub use sync_queue::{
    EnqueueSyncRequest, NewQueueItem, QueueStatus, SyncOperation, SyncQueueItem,
    DEFAULT_MAX_ATTEMPTS, RETRY_BACKOFF_SECS,
};
