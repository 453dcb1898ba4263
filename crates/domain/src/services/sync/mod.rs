//! Cross-system entity synchronization.
//!
//! The [`QueueProcessor`] drains queued requests and invokes the
//! [`SyncEngine`], which uses an [`ExternalSystemAdapter`] built per run, the
//! [`EntityMapper`] of the integration kind, the [`MappingStore`] and the
//! [`LocalEntityStore`], and records every run in the [`SyncLogStore`].

pub mod engine;
pub mod error;
pub mod mapper;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod ports;
pub mod queue;

pub use engine::{SyncEngine, DEFAULT_MAX_LOGGED_ERRORS};
pub use error::{AdapterError, BoxError, SyncError};
pub use mapper::{Bitrix24Mapper, EntityMapper, OneCMapper};
pub use ports::{
    AdapterFactory, ExternalSystemAdapter, IntegrationConfigStore, LocalEntityStore,
    MappingStore, SyncLogStore, SyncQueueStore,
};
pub use queue::{QueueProcessor, QueueRunStats, QueueSettings};
