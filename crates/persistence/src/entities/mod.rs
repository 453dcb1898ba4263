//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod client;
pub mod entity_mapping;
pub mod integration;
pub mod sync_log;
pub mod sync_queue;

pub use client::ClientEntity;
pub use entity_mapping::EntityMappingEntity;
pub use integration::IntegrationEntity;
pub use sync_log::SyncLogEntity;
pub use sync_queue::SyncQueueEntity;
