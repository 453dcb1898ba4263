//! Entity mapping repository for database operations.
//!
//! Uniqueness is enforced by the two UNIQUE constraints on the table; a
//! violation surfaces as `SyncError::DuplicateMapping`.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::{EntityMapping, EntityType, NewEntityMapping};
use domain::services::{MappingStore, SyncError};

use super::{is_unique_violation, storage_error};
use crate::entities::EntityMappingEntity;
use crate::metrics::QueryTimer;

/// Repository for entity mapping database operations.
#[derive(Clone)]
pub struct EntityMappingRepository {
    pool: PgPool,
}

impl EntityMappingRepository {
    /// Creates a new EntityMappingRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find mapping by external id.
    pub async fn find_by_external_id(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        external_id: &str,
    ) -> Result<Option<EntityMappingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_mapping_by_external_id");
        let result = sqlx::query_as::<_, EntityMappingEntity>(
            r#"
            SELECT * FROM entity_mappings
            WHERE integration_id = $1 AND entity_type = $2 AND external_id = $3
            "#,
        )
        .bind(integration_id)
        .bind(entity_type.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Find mapping by local id.
    pub async fn find_by_local(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        local_id: i64,
    ) -> Result<Option<EntityMappingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_mapping_by_local_id");
        let result = sqlx::query_as::<_, EntityMappingEntity>(
            r#"
            SELECT * FROM entity_mappings
            WHERE integration_id = $1 AND entity_type = $2 AND local_id = $3
            "#,
        )
        .bind(integration_id)
        .bind(entity_type.as_str())
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Insert a mapping.
    pub async fn insert(
        &self,
        mapping: &NewEntityMapping,
    ) -> Result<EntityMappingEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_mapping");
        let result = sqlx::query_as::<_, EntityMappingEntity>(
            r#"
            INSERT INTO entity_mappings (integration_id, entity_type, local_id, external_id, direction)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(mapping.integration_id)
        .bind(mapping.entity_type.as_str())
        .bind(mapping.local_id)
        .bind(&mapping.external_id)
        .bind(mapping.direction.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Count mappings for an integration and entity type.
    pub async fn count_for(
        &self,
        integration_id: i64,
        entity_type: EntityType,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_mappings");
        let result = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*) FROM entity_mappings
            WHERE integration_id = $1 AND entity_type = $2
            "#,
        )
        .bind(integration_id)
        .bind(entity_type.as_str())
        .fetch_one(&self.pool)
        .await;
        Ok(timer.finish(result)?.0)
    }
}

#[async_trait]
impl MappingStore for EntityMappingRepository {
    async fn find(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        external_id: &str,
    ) -> Result<Option<EntityMapping>, SyncError> {
        Ok(self
            .find_by_external_id(integration_id, entity_type, external_id)
            .await
            .map_err(storage_error)?
            .map(EntityMapping::from))
    }

    async fn find_by_local_id(
        &self,
        integration_id: i64,
        entity_type: EntityType,
        local_id: i64,
    ) -> Result<Option<EntityMapping>, SyncError> {
        Ok(self
            .find_by_local(integration_id, entity_type, local_id)
            .await
            .map_err(storage_error)?
            .map(EntityMapping::from))
    }

    async fn create(&self, mapping: NewEntityMapping) -> Result<EntityMapping, SyncError> {
        match self.insert(&mapping).await {
            Ok(entity) => Ok(entity.into()),
            Err(e) if is_unique_violation(&e) => Err(SyncError::DuplicateMapping {
                integration_id: mapping.integration_id,
                entity_type: mapping.entity_type,
                local_id: mapping.local_id,
                external_id: mapping.external_id,
            }),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn count(&self, integration_id: i64, entity_type: EntityType) -> Result<i64, SyncError> {
        self.count_for(integration_id, entity_type)
            .await
            .map_err(storage_error)
    }
}
