//! Synchronization engine.
//!
//! Moves one entity type between local storage and one external system in
//! one direction. Records are processed one at a time; a failing record is
//! counted and reported without aborting the run.

use std::sync::Arc;

use metrics::counter;
use tracing::Instrument;

use super::error::{AdapterError, SyncError};
use super::mapper::EntityMapper;
use super::ports::{
    AdapterFactory, ExternalSystemAdapter, IntegrationConfigStore, LocalEntityStore,
    MappingStore, SyncLogStore,
};
use crate::models::sync::RecordOutcome;
use crate::models::{
    EntityType, IntegrationConfig, ListFilter, LocalEntity, NewEntityMapping, NewSyncLog,
    SyncDirection, SyncLogOutcome, SyncResult,
};

/// Number of per-record errors kept in a sync log when not configured.
pub const DEFAULT_MAX_LOGGED_ERRORS: usize = 10;

/// Orchestrates sync runs.
pub struct SyncEngine {
    integrations: Arc<dyn IntegrationConfigStore>,
    local_store: Arc<dyn LocalEntityStore>,
    mappings: Arc<dyn MappingStore>,
    logs: Arc<dyn SyncLogStore>,
    adapters: Arc<dyn AdapterFactory>,
    max_logged_errors: usize,
}

impl SyncEngine {
    /// Create a new engine over the given stores and adapter factory.
    pub fn new(
        integrations: Arc<dyn IntegrationConfigStore>,
        local_store: Arc<dyn LocalEntityStore>,
        mappings: Arc<dyn MappingStore>,
        logs: Arc<dyn SyncLogStore>,
        adapters: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            integrations,
            local_store,
            mappings,
            logs,
            adapters,
            max_logged_errors: DEFAULT_MAX_LOGGED_ERRORS,
        }
    }

    pub fn with_max_logged_errors(mut self, max: usize) -> Self {
        self.max_logged_errors = max.max(1);
        self
    }

    pub fn max_logged_errors(&self) -> usize {
        self.max_logged_errors
    }

    /// Runs a client sync with a sync log.
    pub async fn sync_clients(
        &self,
        integration_id: i64,
        direction: SyncDirection,
    ) -> Result<SyncResult, SyncError> {
        self.run(integration_id, EntityType::Client, direction).await
    }

    /// Runs a sync wrapped in a sync log entry.
    ///
    /// The log is written as `started` before any work and finalized exactly
    /// once, whether the run returns a result or an error.
    pub async fn run(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        direction: SyncDirection,
    ) -> Result<SyncResult, SyncError> {
        let log = self
            .logs
            .start(NewSyncLog::new(integration_id, entity_type, direction))
            .await?;

        let span = tracing::info_span!(
            "sync_run",
            run_id = %log.run_id,
            integration_id,
            entity_type = %entity_type,
            direction = %direction,
        );

        let outcome = self
            .sync_entities(integration_id, entity_type, direction)
            .instrument(span.clone())
            .await;

        self.finalize_log(log.id, direction, &outcome)
            .instrument(span)
            .await;

        outcome
    }

    async fn finalize_log(
        &self,
        log_id: i64,
        direction: SyncDirection,
        outcome: &Result<SyncResult, SyncError>,
    ) {
        let log_outcome = match outcome {
            Ok(result) => {
                tracing::info!(
                    processed = result.records_processed,
                    successful = result.records_successful,
                    failed = result.records_failed,
                    created = result.records_created,
                    updated = result.records_updated,
                    unchanged = result.records_unchanged,
                    "Sync run finished"
                );
                SyncLogOutcome::from_result(result, self.max_logged_errors)
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync run aborted");
                SyncLogOutcome::aborted(e.to_string())
            }
        };

        let status = log_outcome.status;
        if let Err(e) = self.logs.finish(log_id, log_outcome).await {
            tracing::error!(sync_log_id = log_id, error = %e, "Failed to finalize sync log");
        }

        counter!(
            "sync_runs_total",
            "direction" => direction.as_str(),
            "status" => status.as_str()
        )
        .increment(1);
    }

    /// Runs a sync without writing a sync log.
    pub async fn sync_entities(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        direction: SyncDirection,
    ) -> Result<SyncResult, SyncError> {
        let config = self.resolve(integration_id).await?;
        let adapter = self.adapters.build(&config)?;
        let mapper = config.kind.mapper();

        let result = match direction {
            SyncDirection::Import => {
                self.import(&config, adapter.as_ref(), mapper, entity_type)
                    .await
            }
            SyncDirection::Export => {
                self.export(&config, adapter.as_ref(), mapper, entity_type)
                    .await
            }
        };

        self.persist_refreshed_credentials(&config, adapter.as_ref())
            .await;

        result
    }

    /// Probes the connection of an integration. Never errors.
    pub async fn test_connection(&self, config: &IntegrationConfig) -> bool {
        match self.adapters.build(config) {
            Ok(adapter) => {
                let ok = adapter.test_connection().await;
                self.persist_refreshed_credentials(config, adapter.as_ref())
                    .await;
                ok
            }
            Err(e) => {
                tracing::warn!(integration_id = config.id, error = %e, "Cannot build adapter");
                false
            }
        }
    }

    async fn resolve(&self, integration_id: i64) -> Result<IntegrationConfig, SyncError> {
        let config = self
            .integrations
            .get(integration_id)
            .await?
            .ok_or(SyncError::IntegrationNotFound(integration_id))?;
        if !config.is_active {
            return Err(SyncError::IntegrationInactive(integration_id));
        }
        Ok(config)
    }

    async fn persist_refreshed_credentials(
        &self,
        config: &IntegrationConfig,
        adapter: &dyn ExternalSystemAdapter,
    ) {
        let Some(credentials) = adapter.take_refreshed_credentials() else {
            return;
        };
        match self
            .integrations
            .update_credentials(config.id, &credentials)
            .await
        {
            Ok(()) => tracing::info!(integration_id = config.id, "Stored refreshed credentials"),
            Err(e) => tracing::error!(
                integration_id = config.id,
                error = %e,
                "Failed to store refreshed credentials"
            ),
        }
    }

    // ========================================================================
    // Import
    // ========================================================================

    async fn import(
        &self,
        config: &IntegrationConfig,
        adapter: &dyn ExternalSystemAdapter,
        mapper: &dyn EntityMapper,
        entity_type: EntityType,
    ) -> Result<SyncResult, SyncError> {
        let records = adapter
            .list_entities(entity_type, &ListFilter::default())
            .await?;
        tracing::info!(count = records.len(), "Fetched external records");

        let mut result = SyncResult::for_batch(records.len());
        for (index, record) in records.iter().enumerate() {
            let label = mapper
                .external_id(entity_type, record)
                .unwrap_or_else(|_| format!("record #{}", index + 1));

            match self
                .import_record(config.id, mapper, entity_type, record)
                .await
            {
                Ok(outcome) => {
                    record_outcome_metric(outcome);
                    result.record(outcome);
                }
                Err(e) => {
                    tracing::warn!(external_id = %label, error = %e, "Failed to import record");
                    counter!("sync_records_total", "outcome" => "failed").increment(1);
                    result.record_failure(&label, &e);
                }
            }
        }

        Ok(result.finish(entity_type, SyncDirection::Import))
    }

    async fn import_record(
        &self,
        integration_id: i64,
        mapper: &dyn EntityMapper,
        entity_type: EntityType,
        record: &serde_json::Value,
    ) -> Result<RecordOutcome, SyncError> {
        let external_id = mapper.external_id(entity_type, record)?;
        let data = mapper.external_to_local(entity_type, record)?;

        match self
            .mappings
            .find(integration_id, entity_type, &external_id)
            .await?
        {
            Some(mapping) => {
                let local = self.local_store.get(entity_type, mapping.local_id).await?;
                if local.data == data {
                    return Ok(RecordOutcome::Unchanged);
                }
                self.local_store.update(local.id, &data).await?;
                Ok(RecordOutcome::Updated)
            }
            None => {
                // A failed mapping insert leaves the local record in place.
                let local = self.local_store.create(&data).await?;
                self.mappings
                    .create(NewEntityMapping {
                        integration_id,
                        entity_type,
                        local_id: local.id,
                        external_id,
                        direction: SyncDirection::Import,
                    })
                    .await?;
                Ok(RecordOutcome::Created)
            }
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    async fn export(
        &self,
        config: &IntegrationConfig,
        adapter: &dyn ExternalSystemAdapter,
        mapper: &dyn EntityMapper,
        entity_type: EntityType,
    ) -> Result<SyncResult, SyncError> {
        let locals = self.local_store.list_all(entity_type).await?;
        tracing::info!(count = locals.len(), "Loaded local records");

        let mut result = SyncResult::for_batch(locals.len());
        for local in &locals {
            match self
                .export_record(config.id, adapter, mapper, entity_type, local)
                .await
            {
                Ok(outcome) => {
                    record_outcome_metric(outcome);
                    result.record(outcome);
                }
                Err(e) => {
                    tracing::warn!(local_id = local.id, error = %e, "Failed to export record");
                    counter!("sync_records_total", "outcome" => "failed").increment(1);
                    result.record_failure(&local.id.to_string(), &e);
                }
            }
        }

        Ok(result.finish(entity_type, SyncDirection::Export))
    }

    async fn export_record(
        &self,
        integration_id: i64,
        adapter: &dyn ExternalSystemAdapter,
        mapper: &dyn EntityMapper,
        entity_type: EntityType,
        local: &LocalEntity,
    ) -> Result<RecordOutcome, SyncError> {
        let payload = mapper.local_to_external(&local.data);

        match self
            .mappings
            .find_by_local_id(integration_id, entity_type, local.id)
            .await?
        {
            Some(mapping) => {
                let accepted = adapter
                    .update_entity(entity_type, &mapping.external_id, &payload)
                    .await?;
                if !accepted {
                    return Err(AdapterError::remote(
                        None,
                        format!("update of {} was not accepted", mapping.external_id),
                    )
                    .into());
                }
                Ok(RecordOutcome::Updated)
            }
            None => {
                let external_id = adapter.create_entity(entity_type, &payload).await?;
                self.mappings
                    .create(NewEntityMapping {
                        integration_id,
                        entity_type,
                        local_id: local.id,
                        external_id,
                        direction: SyncDirection::Export,
                    })
                    .await?;
                Ok(RecordOutcome::Created)
            }
        }
    }
}

fn record_outcome_metric(outcome: RecordOutcome) {
    let label = match outcome {
        RecordOutcome::Created => "created",
        RecordOutcome::Updated => "updated",
        RecordOutcome::Unchanged => "unchanged",
    };
    counter!("sync_records_total", "outcome" => label).increment(1);
}
