//! In-memory store implementations and a scriptable mock adapter.
//!
//! Test support for the engine, queue and route tests. Compiled for this
//! crate's tests and for dependents that enable the `test-util` feature.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::{AdapterError, SyncError};
use super::ports::{
    AdapterFactory, ExternalSystemAdapter, IntegrationConfigStore, LocalEntityStore,
    MappingStore, SyncLogStore, SyncQueueStore,
};
use crate::models::{
    ClientInput, Credentials, EntityData, EntityMapping, EntityType, IntegrationConfig,
    IntegrationKind, ListFilter, LocalEntity, NewEntityMapping, NewIntegration, NewQueueItem,
    NewSyncLog, QueueStatus, SyncLog, SyncLogOutcome, SyncLogStatus, SyncQueueItem,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Integrations
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryIntegrationStore {
    items: Mutex<BTreeMap<i64, IntegrationConfig>>,
}

impl InMemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationConfigStore for InMemoryIntegrationStore {
    async fn get(&self, id: i64) -> Result<Option<IntegrationConfig>, SyncError> {
        Ok(lock(&self.items).get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<IntegrationConfig>, SyncError> {
        Ok(lock(&self.items).values().cloned().collect())
    }

    async fn create(&self, new: NewIntegration) -> Result<IntegrationConfig, SyncError> {
        let mut items = lock(&self.items);
        let id = items.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let config = IntegrationConfig {
            id,
            name: new.name,
            kind: new.kind,
            base_url: new.base_url,
            credentials: new.credentials,
            options: new.options,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        items.insert(id, config.clone());
        Ok(config)
    }

    async fn update_credentials(
        &self,
        id: i64,
        credentials: &Credentials,
    ) -> Result<(), SyncError> {
        let mut items = lock(&self.items);
        let config = items
            .get_mut(&id)
            .ok_or(SyncError::IntegrationNotFound(id))?;
        config.credentials = credentials.clone();
        config.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Local clients
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    clients: Mutex<BTreeMap<i64, ClientInput>>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a client directly and returns its id.
    pub fn insert(&self, client: ClientInput) -> i64 {
        let mut clients = lock(&self.clients);
        let id = clients.keys().next_back().copied().unwrap_or(0) + 1;
        clients.insert(id, client);
        id
    }

    pub fn client(&self, id: i64) -> Option<ClientInput> {
        lock(&self.clients).get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.clients).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LocalEntityStore for InMemoryClientStore {
    async fn list_all(&self, entity_type: EntityType) -> Result<Vec<LocalEntity>, SyncError> {
        match entity_type {
            EntityType::Client => Ok(lock(&self.clients)
                .iter()
                .map(|(id, client)| LocalEntity {
                    id: *id,
                    data: EntityData::Client(client.clone()),
                })
                .collect()),
        }
    }

    async fn get(&self, entity_type: EntityType, id: i64) -> Result<LocalEntity, SyncError> {
        match entity_type {
            EntityType::Client => lock(&self.clients)
                .get(&id)
                .map(|client| LocalEntity {
                    id,
                    data: EntityData::Client(client.clone()),
                })
                .ok_or_else(|| SyncError::NotFound(format!("client {}", id))),
        }
    }

    async fn create(&self, data: &EntityData) -> Result<LocalEntity, SyncError> {
        let EntityData::Client(client) = data;
        let id = self.insert(client.clone());
        Ok(LocalEntity {
            id,
            data: data.clone(),
        })
    }

    async fn update(&self, id: i64, data: &EntityData) -> Result<LocalEntity, SyncError> {
        let EntityData::Client(client) = data;
        let mut clients = lock(&self.clients);
        let slot = clients
            .get_mut(&id)
            .ok_or_else(|| SyncError::NotFound(format!("client {}", id)))?;
        *slot = client.clone();
        Ok(LocalEntity {
            id,
            data: data.clone(),
        })
    }
}

// ============================================================================
// Mappings
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    mappings: Mutex<Vec<EntityMapping>>,
    /// Written just before the next create, as if by a concurrent run.
    concurrent_insert: Mutex<Option<NewEntityMapping>>,
    fail_next_create: AtomicBool,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another run inserting `mapping` between lookup and create.
    pub fn insert_before_next_create(&self, mapping: NewEntityMapping) {
        *lock(&self.concurrent_insert) = Some(mapping);
    }

    /// Makes the next create fail with a storage error.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<EntityMapping> {
        lock(&self.mappings).clone()
    }

    fn insert(mappings: &mut Vec<EntityMapping>, new: NewEntityMapping) -> Result<EntityMapping, SyncError> {
        if mappings.iter().any(|m| new.conflicts_with(m)) {
            return Err(SyncError::DuplicateMapping {
                integration_id: new.integration_id,
                entity_type: new.entity_type,
                local_id: new.local_id,
                external_id: new.external_id,
            });
        }
        let mapping = EntityMapping {
            id: mappings.len() as i64 + 1,
            integration_id: new.integration_id,
            entity_type: new.entity_type,
            local_id: new.local_id,
            external_id: new.external_id,
            direction: new.direction,
            created_at: Utc::now(),
        };
        mappings.push(mapping.clone());
        Ok(mapping)
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn find(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        external_id: &str,
    ) -> Result<Option<EntityMapping>, SyncError> {
        Ok(lock(&self.mappings)
            .iter()
            .find(|m| {
                m.integration_id == integration_id
                    && m.entity_type == entity_type
                    && m.external_id == external_id
            })
            .cloned())
    }

    async fn find_by_local_id(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        local_id: i64,
    ) -> Result<Option<EntityMapping>, SyncError> {
        Ok(lock(&self.mappings)
            .iter()
            .find(|m| {
                m.integration_id == integration_id
                    && m.entity_type == entity_type
                    && m.local_id == local_id
            })
            .cloned())
    }

    async fn create(&self, mapping: NewEntityMapping) -> Result<EntityMapping, SyncError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Storage("connection reset".into()));
        }
        let mut mappings = lock(&self.mappings);
        if let Some(competing) = lock(&self.concurrent_insert).take() {
            Self::insert(&mut mappings, competing)?;
        }
        Self::insert(&mut mappings, mapping)
    }

    async fn count(&self, integration_id: i64, entity_type: EntityType) -> Result<i64, SyncError> {
        Ok(lock(&self.mappings)
            .iter()
            .filter(|m| m.integration_id == integration_id && m.entity_type == entity_type)
            .count() as i64)
    }
}

// ============================================================================
// Sync logs
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemorySyncLogStore {
    logs: Mutex<Vec<SyncLog>>,
}

impl InMemorySyncLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<SyncLog> {
        lock(&self.logs).clone()
    }
}

#[async_trait]
impl SyncLogStore for InMemorySyncLogStore {
    async fn start(&self, log: NewSyncLog) -> Result<SyncLog, SyncError> {
        let mut logs = lock(&self.logs);
        let entry = SyncLog {
            id: logs.len() as i64 + 1,
            run_id: log.run_id,
            integration_id: log.integration_id,
            operation: log.operation,
            entity_type: log.entity_type,
            direction: log.direction,
            status: SyncLogStatus::Started,
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            error_message: None,
            details: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        logs.push(entry.clone());
        Ok(entry)
    }

    async fn finish(&self, id: i64, outcome: SyncLogOutcome) -> Result<SyncLog, SyncError> {
        let mut logs = lock(&self.logs);
        let log = logs
            .iter_mut()
            .find(|l| l.id == id && l.status == SyncLogStatus::Started)
            .ok_or_else(|| SyncError::NotFound(format!("open sync log {}", id)))?;
        log.status = outcome.status;
        log.records_processed = outcome.records_processed;
        log.records_successful = outcome.records_successful;
        log.records_failed = outcome.records_failed;
        log.error_message = outcome.error_message;
        log.details = outcome.details;
        log.completed_at = Some(outcome.completed_at);
        Ok(log.clone())
    }

    async fn get(&self, id: i64) -> Result<Option<SyncLog>, SyncError> {
        Ok(lock(&self.logs).iter().find(|l| l.id == id).cloned())
    }

    async fn list_by_integration(
        &self,
        integration_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SyncLog>, SyncError> {
        Ok(lock(&self.logs)
            .iter()
            .rev()
            .filter(|l| l.integration_id == integration_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Sync queue
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemorySyncQueueStore {
    items: Mutex<Vec<SyncQueueItem>>,
}

impl InMemorySyncQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<SyncQueueItem> {
        lock(&self.items).clone()
    }

    /// Applies `f` to an item still processing under `token`.
    fn update_claimed<F>(&self, id: i64, token: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut SyncQueueItem),
    {
        let mut items = lock(&self.items);
        match items.iter_mut().find(|i| {
            i.id == id && i.status == QueueStatus::Processing && i.claim_token == Some(token)
        }) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SyncQueueStore for InMemorySyncQueueStore {
    async fn enqueue(&self, item: NewQueueItem) -> Result<SyncQueueItem, SyncError> {
        let mut items = lock(&self.items);
        let now = Utc::now();
        let entry = SyncQueueItem {
            id: items.len() as i64 + 1,
            integration_id: item.integration_id,
            operation: item.operation,
            direction: item.direction,
            status: QueueStatus::Pending,
            attempts: 0,
            max_attempts: item.max_attempts,
            scheduled_at: item.scheduled_at.unwrap_or(now),
            processed_at: None,
            last_error: None,
            claim_token: None,
            created_at: now,
            updated_at: now,
        };
        items.push(entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: i64) -> Result<Option<SyncQueueItem>, SyncError> {
        Ok(lock(&self.items).iter().find(|i| i.id == id).cloned())
    }

    async fn due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<SyncQueueItem>, SyncError> {
        let mut due: Vec<SyncQueueItem> = lock(&self.items)
            .iter()
            .filter(|i| i.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|i| (i.scheduled_at, i.id));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn claim(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncQueueItem>, SyncError> {
        let mut items = lock(&self.items);
        match items
            .iter_mut()
            .find(|i| i.id == id && i.status == QueueStatus::Pending)
        {
            Some(item) => {
                item.status = QueueStatus::Processing;
                item.claim_token = Some(token);
                item.processed_at = Some(now);
                item.updated_at = now;
                Ok(Some(item.clone()))
            }
            None => Ok(None),
        }
    }

    async fn heartbeat(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        Ok(self.update_claimed(id, token, |item| item.updated_at = now))
    }

    async fn complete(
        &self,
        id: i64,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        Ok(self.update_claimed(id, token, |item| {
            item.status = QueueStatus::Completed;
            item.claim_token = None;
            item.last_error = None;
            item.updated_at = now;
        }))
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
        Ok(self.update_claimed(id, token, |item| {
            item.status = QueueStatus::Pending;
            item.claim_token = None;
            item.attempts = attempts;
            item.scheduled_at = next_at;
            item.last_error = Some(error.to_string());
            item.updated_at = now;
        }))
    }

    async fn fail(
        &self,
        id: i64,
        token: Uuid,
        attempts: i32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        Ok(self.update_claimed(id, token, |item| {
            item.status = QueueStatus::Failed;
            item.claim_token = None;
            item.attempts = attempts;
            item.last_error = Some(error.to_string());
            item.updated_at = now;
        }))
    }

    async fn requeue_stale(
        &self,
        before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, SyncError> {
        let mut items = lock(&self.items);
        let mut count = 0;
        for item in items
            .iter_mut()
            .filter(|i| i.status == QueueStatus::Processing && i.updated_at < before)
        {
            item.status = QueueStatus::Pending;
            item.claim_token = None;
            item.updated_at = now;
            count += 1;
        }
        Ok(count)
    }
}

// ============================================================================
// Mock adapter
// ============================================================================

/// Failure a [`MockAdapter`] can be scripted to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Auth,
    Connectivity,
    Remote(u16),
}

impl MockFailure {
    fn to_error(&self, operation: &str) -> AdapterError {
        match self {
            MockFailure::Auth => AdapterError::auth(format!("{} rejected credentials", operation)),
            MockFailure::Connectivity => {
                AdapterError::connectivity(format!("{} timed out", operation))
            }
            MockFailure::Remote(status) => {
                AdapterError::remote(Some(*status), format!("{} failed", operation))
            }
        }
    }
}

/// Scriptable adapter that keeps external records in memory.
#[derive(Debug)]
pub struct MockAdapter {
    kind: IntegrationKind,
    records: Mutex<Vec<Value>>,
    list_failure: Mutex<Option<MockFailure>>,
    /// Create failures keyed by 1-based call number.
    create_failures: Mutex<HashMap<usize, MockFailure>>,
    update_accepted: AtomicBool,
    connection_ok: AtomicBool,
    create_calls: AtomicUsize,
    created: Mutex<Vec<(String, Value)>>,
    updated: Mutex<Vec<(String, Value)>>,
    refreshed: Mutex<Option<Credentials>>,
}

impl MockAdapter {
    /// Create a new mock adapter with no records.
    pub fn new(kind: IntegrationKind) -> Self {
        Self {
            kind,
            records: Mutex::new(Vec::new()),
            list_failure: Mutex::new(None),
            create_failures: Mutex::new(HashMap::new()),
            update_accepted: AtomicBool::new(true),
            connection_ok: AtomicBool::new(true),
            create_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
            refreshed: Mutex::new(None),
        }
    }

    pub fn with_records(self, records: Vec<Value>) -> Self {
        *lock(&self.records) = records;
        self
    }

    pub fn set_records(&self, records: Vec<Value>) {
        *lock(&self.records) = records;
    }

    pub fn fail_list(&self, failure: MockFailure) {
        *lock(&self.list_failure) = Some(failure);
    }

    /// Fails the `call`-th create (1-based).
    pub fn fail_create_call(&self, call: usize, failure: MockFailure) {
        lock(&self.create_failures).insert(call, failure);
    }

    pub fn reject_updates(&self) {
        self.update_accepted.store(false, Ordering::SeqCst);
    }

    pub fn set_connection_ok(&self, ok: bool) {
        self.connection_ok.store(ok, Ordering::SeqCst);
    }

    /// Reports `credentials` as rotated after the run.
    pub fn rotate_credentials(&self, credentials: Credentials) {
        *lock(&self.refreshed) = Some(credentials);
    }

    pub fn created(&self) -> Vec<(String, Value)> {
        lock(&self.created).clone()
    }

    pub fn updated(&self) -> Vec<(String, Value)> {
        lock(&self.updated).clone()
    }
}

#[async_trait]
impl ExternalSystemAdapter for MockAdapter {
    fn kind(&self) -> IntegrationKind {
        self.kind
    }

    async fn list_entities(
        &self,
        _entity_type: EntityType,
        _filter: &ListFilter,
    ) -> Result<Vec<Value>, AdapterError> {
        if let Some(failure) = lock(&self.list_failure).as_ref() {
            return Err(failure.to_error("list"));
        }
        Ok(lock(&self.records).clone())
    }

    async fn create_entity(
        &self,
        _entity_type: EntityType,
        record: &Value,
    ) -> Result<String, AdapterError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(failure) = lock(&self.create_failures).get(&call) {
            return Err(failure.to_error("create"));
        }
        let external_id = format!("ext-{}", call);
        lock(&self.created).push((external_id.clone(), record.clone()));
        Ok(external_id)
    }

    async fn update_entity(
        &self,
        _entity_type: EntityType,
        external_id: &str,
        record: &Value,
    ) -> Result<bool, AdapterError> {
        if !self.update_accepted.load(Ordering::SeqCst) {
            return Ok(false);
        }
        lock(&self.updated).push((external_id.to_string(), record.clone()));
        Ok(true)
    }

    async fn test_connection(&self) -> bool {
        self.connection_ok.load(Ordering::SeqCst)
    }

    fn take_refreshed_credentials(&self) -> Option<Credentials> {
        lock(&self.refreshed).take()
    }
}

/// Hands out the same mock adapter for every integration.
#[derive(Debug, Clone)]
pub struct MockAdapterFactory {
    adapter: Arc<MockAdapter>,
}

impl MockAdapterFactory {
    pub fn new(adapter: Arc<MockAdapter>) -> Self {
        Self { adapter }
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn build(
        &self,
        config: &IntegrationConfig,
    ) -> Result<Arc<dyn ExternalSystemAdapter>, SyncError> {
        if config.kind != self.adapter.kind {
            return Err(SyncError::UnsupportedIntegration(format!(
                "mock adapter serves {}, integration {} is {}",
                self.adapter.kind, config.id, config.kind
            )));
        }
        Ok(self.adapter.clone())
    }
}
