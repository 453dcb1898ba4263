//! Entity mapping entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use domain::models::{EntityMapping, EntityType, SyncDirection};

/// Database row mapping for the entity_mappings table.
#[derive(Debug, Clone, FromRow)]
pub struct EntityMappingEntity {
    pub id: i64,
    pub integration_id: i64,
    pub entity_type: String,
    pub local_id: i64,
    pub external_id: String,
    pub direction: String,
    pub created_at: DateTime<Utc>,
}

impl EntityMappingEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> EntityMapping {
        let entity_type = self
            .entity_type
            .parse::<EntityType>()
            .unwrap_or(EntityType::Client);

        let direction = self
            .direction
            .parse::<SyncDirection>()
            .unwrap_or(SyncDirection::Import);

        EntityMapping {
            id: self.id,
            integration_id: self.integration_id,
            entity_type,
            local_id: self.local_id,
            external_id: self.external_id,
            direction,
            created_at: self.created_at,
        }
    }
}

impl From<EntityMappingEntity> for EntityMapping {
    fn from(entity: EntityMappingEntity) -> Self {
        entity.into_domain()
    }
}
