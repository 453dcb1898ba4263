//! Domain services for ERP sync.
//!
//! Services contain the synchronization logic that operates on domain models.

pub mod sync;

pub use sync::{
    AdapterError, AdapterFactory, EntityMapper, ExternalSystemAdapter, IntegrationConfigStore,
    LocalEntityStore, MappingStore, QueueProcessor, QueueRunStats, QueueSettings, SyncEngine,
    SyncError, SyncLogStore, SyncQueueStore,
};
