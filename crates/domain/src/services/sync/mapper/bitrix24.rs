//! Bitrix24 CRM company mapping.

use serde_json::{json, Map, Value};

use super::{check_inn, text_field, EntityMapper};
use crate::models::{ClientInput, EntityData, EntityType};
use crate::services::sync::error::SyncError;

const MULTI_FIELD_TYPE: &str = "WORK";

/// Maps local clients to `crm.company` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bitrix24Mapper;

/// Returns the first non-empty `VALUE` of a multi-field list.
fn first_multi_value(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)?
        .as_array()?
        .iter()
        .find_map(|entry| text_field(entry, "VALUE"))
}

fn multi_value(value: &str) -> Value {
    json!([{ "VALUE": value, "VALUE_TYPE": MULTI_FIELD_TYPE }])
}

impl EntityMapper for Bitrix24Mapper {
    fn local_to_external(&self, data: &EntityData) -> Value {
        let EntityData::Client(client) = data;

        let mut out = Map::new();
        out.insert("TITLE".into(), json!(client.name));
        if let Some(inn) = &client.inn {
            out.insert("UF_CRM_INN".into(), json!(inn));
        }
        if let Some(kpp) = &client.kpp {
            out.insert("UF_CRM_KPP".into(), json!(kpp));
        }
        if let Some(phone) = &client.phone {
            out.insert("PHONE".into(), multi_value(phone));
        }
        if let Some(email) = &client.email {
            out.insert("EMAIL".into(), multi_value(email));
        }
        if let Some(address) = &client.address {
            out.insert("ADDRESS".into(), json!(address));
        }
        if let Some(comment) = &client.comment {
            out.insert("COMMENTS".into(), json!(comment));
        }
        Value::Object(out)
    }

    fn external_to_local(
        &self,
        entity_type: EntityType,
        record: &Value,
    ) -> Result<EntityData, SyncError> {
        let id = self.external_id(entity_type, record)?;
        let name = text_field(record, "TITLE")
            .ok_or_else(|| SyncError::Mapping(format!("company {} has no TITLE", id)))?;

        let inn = text_field(record, "UF_CRM_INN");
        check_inn(&id, inn.as_deref());

        Ok(EntityData::Client(ClientInput {
            name,
            full_name: None,
            inn,
            kpp: text_field(record, "UF_CRM_KPP"),
            phone: first_multi_value(record, "PHONE"),
            email: first_multi_value(record, "EMAIL"),
            address: text_field(record, "ADDRESS"),
            comment: text_field(record, "COMMENTS"),
            // CRM companies have no soft-delete flag
            is_active: true,
        }))
    }

    fn external_id(&self, _entity_type: EntityType, record: &Value) -> Result<String, SyncError> {
        text_field(record, "ID").ok_or_else(|| SyncError::Mapping("company has no ID".into()))
    }
}
