//! Client repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::{ClientInput, EntityData, EntityType, LocalEntity};
use domain::services::{LocalEntityStore, SyncError};

use super::storage_error;
use crate::entities::ClientEntity;
use crate::metrics::QueryTimer;

/// Repository for client-related database operations.
#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    /// Creates a new ClientRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List all clients ordered by id.
    pub async fn find_all(&self) -> Result<Vec<ClientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_all_clients");
        let result = sqlx::query_as::<_, ClientEntity>(
            r#"
            SELECT * FROM clients ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Find client by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<ClientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_client_by_id");
        let result = sqlx::query_as::<_, ClientEntity>(
            r#"
            SELECT * FROM clients WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Create a new client.
    pub async fn insert(&self, client: &ClientInput) -> Result<ClientEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_client");
        let result = sqlx::query_as::<_, ClientEntity>(
            r#"
            INSERT INTO clients (name, full_name, inn, kpp, phone, email, address, comment, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&client.name)
        .bind(&client.full_name)
        .bind(&client.inn)
        .bind(&client.kpp)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(&client.comment)
        .bind(client.is_active)
        .fetch_one(&self.pool)
        .await;
        timer.finish(result)
    }

    /// Overwrite the syncable fields of a client.
    pub async fn replace(
        &self,
        id: i64,
        client: &ClientInput,
    ) -> Result<Option<ClientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_client");
        let result = sqlx::query_as::<_, ClientEntity>(
            r#"
            UPDATE clients SET
                name = $2,
                full_name = $3,
                inn = $4,
                kpp = $5,
                phone = $6,
                email = $7,
                address = $8,
                comment = $9,
                is_active = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&client.name)
        .bind(&client.full_name)
        .bind(&client.inn)
        .bind(&client.kpp)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(&client.comment)
        .bind(client.is_active)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(result)
    }
}

#[async_trait]
impl LocalEntityStore for ClientRepository {
    async fn list_all(&self, entity_type: EntityType) -> Result<Vec<LocalEntity>, SyncError> {
        match entity_type {
            EntityType::Client => Ok(self
                .find_all()
                .await
                .map_err(storage_error)?
                .into_iter()
                .map(LocalEntity::from)
                .collect()),
        }
    }

    async fn get(&self, entity_type: EntityType, id: i64) -> Result<LocalEntity, SyncError> {
        match entity_type {
            EntityType::Client => self
                .find_by_id(id)
                .await
                .map_err(storage_error)?
                .map(LocalEntity::from)
                .ok_or_else(|| SyncError::NotFound(format!("client {}", id))),
        }
    }

    async fn create(&self, data: &EntityData) -> Result<LocalEntity, SyncError> {
        let EntityData::Client(client) = data;
        let entity = self.insert(client).await.map_err(storage_error)?;
        Ok(entity.into())
    }

    async fn update(&self, id: i64, data: &EntityData) -> Result<LocalEntity, SyncError> {
        let EntityData::Client(client) = data;
        self.replace(id, client)
            .await
            .map_err(storage_error)?
            .map(LocalEntity::from)
            .ok_or_else(|| SyncError::NotFound(format!("client {}", id)))
    }
}
