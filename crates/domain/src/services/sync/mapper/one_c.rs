//! 1C:Enterprise `Catalog_Контрагенты` mapping.

use serde_json::{json, Map, Value};

use super::{check_inn, flag_field, text_field, EntityMapper};
use crate::models::{ClientInput, EntityData, EntityType};
use crate::services::sync::error::SyncError;

const CONTACT_INFO: &str = "КонтактнаяИнформация";
const CONTACT_KIND: &str = "Тип";
const CONTACT_VALUE: &str = "Представление";
const KIND_PHONE: &str = "Телефон";
const KIND_EMAIL: &str = "АдресЭлектроннойПочты";
const KIND_ADDRESS: &str = "Адрес";

/// Reference key 1C uses for an empty link.
const EMPTY_REF: &str = "00000000-0000-0000-0000-000000000000";

/// Maps local clients to counterparty catalog items.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneCMapper;

fn contact(record: &Value, kind: &str) -> Option<String> {
    record
        .get(CONTACT_INFO)?
        .as_array()?
        .iter()
        .filter(|row| row.get(CONTACT_KIND).and_then(Value::as_str) == Some(kind))
        .find_map(|row| text_field(row, CONTACT_VALUE))
}

fn contact_row(kind: &str, value: &str) -> Value {
    let mut row = Map::new();
    row.insert(CONTACT_KIND.into(), json!(kind));
    row.insert(CONTACT_VALUE.into(), json!(value));
    Value::Object(row)
}

impl EntityMapper for OneCMapper {
    fn local_to_external(&self, data: &EntityData) -> Value {
        let EntityData::Client(client) = data;

        let mut out = Map::new();
        out.insert("Description".into(), json!(client.name));
        if let Some(full_name) = &client.full_name {
            out.insert("НаименованиеПолное".into(), json!(full_name));
        }
        if let Some(inn) = &client.inn {
            out.insert("ИНН".into(), json!(inn));
        }
        if let Some(kpp) = &client.kpp {
            out.insert("КПП".into(), json!(kpp));
        }
        if let Some(comment) = &client.comment {
            out.insert("Комментарий".into(), json!(comment));
        }
        out.insert("DeletionMark".into(), json!(!client.is_active));

        let contacts: Vec<Value> = [
            (KIND_PHONE, &client.phone),
            (KIND_EMAIL, &client.email),
            (KIND_ADDRESS, &client.address),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_deref().map(|v| contact_row(kind, v)))
        .collect();
        if !contacts.is_empty() {
            out.insert(CONTACT_INFO.into(), Value::Array(contacts));
        }

        Value::Object(out)
    }

    fn external_to_local(
        &self,
        entity_type: EntityType,
        record: &Value,
    ) -> Result<EntityData, SyncError> {
        let id = self.external_id(entity_type, record)?;
        let name = text_field(record, "Description")
            .ok_or_else(|| SyncError::Mapping(format!("counterparty {} has no Description", id)))?;

        let inn = text_field(record, "ИНН");
        check_inn(&id, inn.as_deref());

        let deleted = flag_field(record, "DeletionMark").unwrap_or(false);

        Ok(EntityData::Client(ClientInput {
            name,
            full_name: text_field(record, "НаименованиеПолное"),
            inn,
            kpp: text_field(record, "КПП"),
            phone: contact(record, KIND_PHONE),
            email: contact(record, KIND_EMAIL),
            address: contact(record, KIND_ADDRESS),
            comment: text_field(record, "Комментарий"),
            is_active: !deleted,
        }))
    }

    fn external_id(&self, _entity_type: EntityType, record: &Value) -> Result<String, SyncError> {
        match text_field(record, "Ref_Key") {
            Some(key) if key != EMPTY_REF => Ok(key),
            _ => Err(SyncError::Mapping("counterparty has no Ref_Key".into())),
        }
    }
}
