//! Entity mapping domain model.
//!
//! A mapping records that a local record and an external record describe the
//! same business entity. Mappings are written once and only looked up afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sync::{EntityType, SyncDirection};

/// Correspondence between a local id and an external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EntityMapping {
    pub id: i64,
    pub integration_id: i64,
    pub entity_type: EntityType,
    pub local_id: i64,
    pub external_id: String,
    /// Direction of the run that first established the correspondence.
    pub direction: SyncDirection,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntityMapping {
    pub integration_id: i64,
    pub entity_type: EntityType,
    pub local_id: i64,
    pub external_id: String,
    pub direction: SyncDirection,
}

impl NewEntityMapping {
    /// Returns true when `other` would collide with this mapping on either
    /// uniqueness key.
    pub fn conflicts_with(&self, other: &EntityMapping) -> bool {
        self.integration_id == other.integration_id
            && self.entity_type == other.entity_type
            && (self.local_id == other.local_id || self.external_id == other.external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing() -> EntityMapping {
        EntityMapping {
            id: 1,
            integration_id: 10,
            entity_type: EntityType::Client,
            local_id: 100,
            external_id: "ext-1".to_string(),
            direction: SyncDirection::Import,
            created_at: Utc::now(),
        }
    }

    fn new_mapping(integration_id: i64, local_id: i64, external_id: &str) -> NewEntityMapping {
        NewEntityMapping {
            integration_id,
            entity_type: EntityType::Client,
            local_id,
            external_id: external_id.to_string(),
            direction: SyncDirection::Export,
        }
    }

    #[test]
    fn test_conflict_on_local_id() {
        assert!(new_mapping(10, 100, "ext-2").conflicts_with(&existing()));
    }

    #[test]
    fn test_conflict_on_external_id() {
        assert!(new_mapping(10, 101, "ext-1").conflicts_with(&existing()));
    }

    #[test]
    fn test_no_conflict_across_integrations() {
        assert!(!new_mapping(11, 100, "ext-1").conflicts_with(&existing()));
    }

    #[test]
    fn test_no_conflict_for_distinct_ids() {
        assert!(!new_mapping(10, 101, "ext-2").conflicts_with(&existing()));
    }
}
