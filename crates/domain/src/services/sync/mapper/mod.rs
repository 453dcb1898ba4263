//! Entity mappers: pure translation between local and external record shapes.
//!
//! Each external system has one mapper, selected by [`IntegrationKind::mapper`].

mod bitrix24;
mod one_c;

use serde_json::Value;

pub use bitrix24::Bitrix24Mapper;
pub use one_c::OneCMapper;

use super::error::SyncError;
use crate::models::{EntityData, EntityType, IntegrationKind};

/// Bidirectional translation for one external system.
pub trait EntityMapper: Send + Sync {
    /// Translates a local record into the external shape. Only present
    /// optional fields are emitted so the result can be used as a partial update.
    fn local_to_external(&self, data: &EntityData) -> Value;

    /// Translates an external record into local fields.
    fn external_to_local(&self, entity_type: EntityType, record: &Value)
        -> Result<EntityData, SyncError>;

    /// Extracts the external id of a record.
    fn external_id(&self, entity_type: EntityType, record: &Value) -> Result<String, SyncError>;
}

static BITRIX24: Bitrix24Mapper = Bitrix24Mapper;
static ONE_C: OneCMapper = OneCMapper;

impl IntegrationKind {
    /// Returns the mapper for this external system.
    pub fn mapper(&self) -> &'static dyn EntityMapper {
        match self {
            IntegrationKind::Bitrix24 => &BITRIX24,
            IntegrationKind::OneC => &ONE_C,
        }
    }
}

// ============================================================================
// Field helpers
// ============================================================================

/// Reads a scalar field as trimmed text. Empty strings and nulls are absent.
pub(crate) fn text_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a boolean field, accepting the `"Y"`/`"N"` convention as well.
pub(crate) fn flag_field(record: &Value, key: &str) -> Option<bool> {
    match record.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "Y" | "true" => Some(true),
            "N" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Logs a warning for an INN that fails the checksum. The value is kept.
pub(crate) fn check_inn(external_id: &str, inn: Option<&str>) {
    if let Some(inn) = inn {
        if !shared::validation::is_valid_inn(inn) {
            tracing::warn!(
                external_id = %external_id,
                inn = %inn,
                "External record has an invalid INN"
            );
        }
    }
}
