//! Client entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{Client, EntityData, LocalEntity};

/// Database row mapping for the clients table.
#[derive(Debug, Clone, FromRow)]
pub struct ClientEntity {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
    pub inn: Option<String>,
    pub kpp: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub comment: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientEntity> for Client {
    fn from(entity: ClientEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            full_name: entity.full_name,
            inn: entity.inn,
            kpp: entity.kpp,
            phone: entity.phone,
            email: entity.email,
            address: entity.address,
            comment: entity.comment,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

impl From<ClientEntity> for LocalEntity {
    fn from(entity: ClientEntity) -> Self {
        let client = Client::from(entity);
        Self {
            id: client.id,
            data: EntityData::Client(client.to_input()),
        }
    }
}
