//! Integration repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::{Credentials, IntegrationConfig, NewIntegration};
use domain::services::{IntegrationConfigStore, SyncError};

use super::storage_error;
use crate::entities::IntegrationEntity;
use crate::metrics::QueryTimer;

/// Repository for integration-related database operations.
#[derive(Clone)]
pub struct IntegrationRepository {
    pool: PgPool,
}

impl IntegrationRepository {
    /// Creates a new IntegrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find integration by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<IntegrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_integration_by_id");
        let result = sqlx::query_as::<_, IntegrationEntity>(
            r#"
            SELECT * FROM integrations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// List all integrations ordered by id.
    pub async fn find_all(&self) -> Result<Vec<IntegrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_all_integrations");
        let result = sqlx::query_as::<_, IntegrationEntity>(
            r#"
            SELECT * FROM integrations ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Create a new integration.
    pub async fn insert(&self, new: &NewIntegration) -> Result<IntegrationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_integration");
        let result = sqlx::query_as::<_, IntegrationEntity>(
            r#"
            INSERT INTO integrations (name, kind, base_url, credentials, options, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(new.kind.as_str())
        .bind(&new.base_url)
        .bind(serde_json::to_value(&new.credentials).unwrap_or_default())
        .bind(serde_json::to_value(&new.options).unwrap_or_default())
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Replace stored credentials. Returns the number of rows updated.
    pub async fn set_credentials(
        &self,
        id: i64,
        credentials: &Credentials,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("update_integration_credentials");
        let result = sqlx::query(
            r#"
            UPDATE integrations
            SET credentials = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(serde_json::to_value(credentials).unwrap_or_default())
        .execute(&self.pool)
        .await;
        Ok(timer.finish(result)?.rows_affected())
    }
}

fn to_domain(entity: IntegrationEntity) -> Result<IntegrationConfig, SyncError> {
    let kind = entity.kind.clone();
    entity
        .into_domain()
        .ok_or(SyncError::UnsupportedIntegration(kind))
}

#[async_trait]
impl IntegrationConfigStore for IntegrationRepository {
    async fn get(&self, id: i64) -> Result<Option<IntegrationConfig>, SyncError> {
        self.find_by_id(id)
            .await
            .map_err(storage_error)?
            .map(to_domain)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<IntegrationConfig>, SyncError> {
        self.find_all()
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn create(&self, new: NewIntegration) -> Result<IntegrationConfig, SyncError> {
        let entity = self.insert(&new).await.map_err(storage_error)?;
        to_domain(entity)
    }

    async fn update_credentials(
        &self,
        id: i64,
        credentials: &Credentials,
    ) -> Result<(), SyncError> {
        match self
            .set_credentials(id, credentials)
            .await
            .map_err(storage_error)?
        {
            0 => Err(SyncError::IntegrationNotFound(id)),
            _ => Ok(()),
        }
    }
}
