//! Collaborator traits used by the engine and the queue processor.
//!
//! PostgreSQL implementations live in the persistence crate; HTTP adapters
//! live in the API crate. `memory` provides in-process implementations for
//! tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::{AdapterError, SyncError};
use crate::models::{
    Credentials, EntityData, EntityMapping, EntityType, IntegrationConfig, IntegrationKind,
    ListFilter, LocalEntity, NewEntityMapping, NewIntegration, NewQueueItem, NewSyncLog,
    SyncLog, SyncLogOutcome, SyncQueueItem,
};

// ============================================================================
// External systems
// ============================================================================

/// Entity operations against one external system.
#[async_trait]
pub trait ExternalSystemAdapter: Send + Sync {
    fn kind(&self) -> IntegrationKind;

    /// Lists external records in their native shape.
    async fn list_entities(
        &self,
        entity_type: EntityType,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, AdapterError>;

    /// Creates a record and returns its external id.
    async fn create_entity(
        &self,
        entity_type: EntityType,
        record: &Value,
    ) -> Result<String, AdapterError>;

    /// Applies a partial update. `Ok(false)` means the system reported no success.
    async fn update_entity(
        &self,
        entity_type: EntityType,
        external_id: &str,
        record: &Value,
    ) -> Result<bool, AdapterError>;

    /// Probes the connection; failures are reported as `false`.
    async fn test_connection(&self) -> bool;

    /// Credentials rotated during this adapter's lifetime, if any.
    fn take_refreshed_credentials(&self) -> Option<Credentials> {
        None
    }
}

/// Builds a short-lived adapter for one integration.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, config: &IntegrationConfig)
        -> Result<Arc<dyn ExternalSystemAdapter>, SyncError>;
}

// ============================================================================
// Stores
// ============================================================================

/// Local business records.
#[async_trait]
pub trait LocalEntityStore: Send + Sync {
    async fn list_all(&self, entity_type: EntityType) -> Result<Vec<LocalEntity>, SyncError>;

    /// Fails with `NotFound` when no record has this id.
    async fn get(&self, entity_type: EntityType, id: i64) -> Result<LocalEntity, SyncError>;

    async fn create(&self, data: &EntityData) -> Result<LocalEntity, SyncError>;

    /// Fails with `NotFound` when no record has this id.
    async fn update(&self, id: i64, data: &EntityData) -> Result<LocalEntity, SyncError>;
}

#[async_trait]
pub trait IntegrationConfigStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<IntegrationConfig>, SyncError>;

    async fn list(&self) -> Result<Vec<IntegrationConfig>, SyncError>;

    async fn create(&self, new: NewIntegration) -> Result<IntegrationConfig, SyncError>;

    async fn update_credentials(&self, id: i64, credentials: &Credentials)
        -> Result<(), SyncError>;
}

/// Durable local id ↔ external id correspondences.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Looks up by external id.
    async fn find(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        external_id: &str,
    ) -> Result<Option<EntityMapping>, SyncError>;

    async fn find_by_local_id(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        local_id: i64,
    ) -> Result<Option<EntityMapping>, SyncError>;

    /// Fails with `DuplicateMapping` when either side is already mapped.
    async fn create(&self, mapping: NewEntityMapping) -> Result<EntityMapping, SyncError>;

    async fn count(&self, integration_id: i64, entity_type: EntityType) -> Result<i64, SyncError>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn start(&self, log: NewSyncLog) -> Result<SyncLog, SyncError>;

    /// Writes the terminal state. Only a log still in `started` is updated.
    async fn finish(&self, id: i64, outcome: SyncLogOutcome) -> Result<SyncLog, SyncError>;

    async fn get(&self, id: i64) -> Result<Option<SyncLog>, SyncError>;

    /// Newest first.
    async fn list_by_integration(
        &self,
        integration_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SyncLog>, SyncError>;
}

#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    async fn enqueue(&self, item: NewQueueItem) -> Result<SyncQueueItem, SyncError>;

    async fn get(&self, id: i64) -> Result<Option<SyncQueueItem>, SyncError>;

    /// Pending items scheduled at or before `now`, oldest schedule first.
    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<SyncQueueItem>, SyncError>;

    /// Atomically moves a pending item to processing under `token`. `None`
    /// when another worker claimed it first.
    async fn claim(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncQueueItem>, SyncError>;

    /// Refreshes `updated_at` of an item still held under `token`.
    async fn heartbeat(&self, id: i64, token: Uuid, now: DateTime<Utc>)
        -> Result<bool, SyncError>;

    // The terminal updates below apply only while the item is processing
    // under `token` and return false once the claim is lost.

    async fn complete(&self, id: i64, token: Uuid, now: DateTime<Utc>)
        -> Result<bool, SyncError>;

    /// Returns the item to pending with a new schedule.
    async fn reschedule(
        &self,
        id: i64,
        token: Uuid,
        attempts: i32,
        next_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError>;

    async fn fail(
        &self,
        id: i64,
        token: Uuid,
        attempts: i32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError>;

    /// Returns items not refreshed since before `before` to pending and
    /// drops their claim.
    async fn requeue_stale(
        &self,
        before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, SyncError>;
}
