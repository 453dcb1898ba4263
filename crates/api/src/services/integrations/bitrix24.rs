//! Bitrix24 CRM REST adapter.
//!
//! `base_url` is either the portal REST root (`https://portal/rest`), used
//! with an OAuth access token sent as the `auth` parameter, or an inbound
//! webhook URL that embeds its own key. Integrations without an access token
//! are treated as webhooks and never refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use domain::models::{Credentials, EntityType, IntegrationConfig, IntegrationKind, ListFilter};
use domain::services::{AdapterError, ExternalSystemAdapter};

use super::http::{build_client, error_message, send};

/// OAuth token endpoint used when the integration does not override it.
pub const DEFAULT_OAUTH_URL: &str = "https://oauth.bitrix.info/oauth/token/";

/// Error codes Bitrix24 returns for a rejected or stale token.
const AUTH_ERROR_CODES: &[&str] = &["expired_token", "invalid_token", "NO_AUTH_FOUND"];

/// Multi-value fields. Bitrix24 appends an entry sent without an `ID`.
const MULTI_FIELDS: &[&str] = &["PHONE", "EMAIL"];

fn entry_value(entry: &Value) -> Option<&str> {
    entry
        .get("VALUE")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Aligns outgoing multi-fields with the stored record.
///
/// The first filled entry is the one import reads. When its value is
/// unchanged the field is left out of the update; otherwise the outgoing
/// entry carries that entry's `ID` and overwrites it.
fn align_multi_fields(stored: &Value, fields: &mut Map<String, Value>) {
    for key in MULTI_FIELDS {
        let Some(current) = stored
            .get(*key)
            .and_then(Value::as_array)
            .and_then(|entries| entries.iter().find(|e| entry_value(e).is_some()))
        else {
            continue;
        };
        let Some(outgoing) = fields
            .get_mut(*key)
            .and_then(Value::as_array_mut)
            .and_then(|entries| entries.first_mut())
            .and_then(Value::as_object_mut)
        else {
            continue;
        };

        let unchanged = outgoing
            .get("VALUE")
            .and_then(Value::as_str)
            .map(str::trim)
            == entry_value(current);
        if unchanged {
            fields.remove(*key);
        } else if let Some(id) = current.get("ID") {
            outgoing.insert("ID".into(), id.clone());
        }
    }
}

/// A missing record on update is a remote failure, not a lookup miss.
fn missing_as_remote(err: AdapterError) -> AdapterError {
    match err {
        AdapterError::NotFound { message, source } => AdapterError::Remote {
            status: Some(404),
            message,
            source,
        },
        other => other,
    }
}

pub struct Bitrix24Adapter {
    client: Client,
    base_url: String,
    oauth_url: String,
    credentials: Mutex<Credentials>,
    rotated: AtomicBool,
}

impl Bitrix24Adapter {
    pub fn new(config: &IntegrationConfig, default_timeout: Duration) -> Result<Self, AdapterError> {
        let timeout = config
            .options
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default_timeout);

        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            oauth_url: config
                .options
                .oauth_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OAUTH_URL.to_string()),
            credentials: Mutex::new(config.credentials.clone()),
            rotated: AtomicBool::new(false),
        })
    }

    fn credentials(&self) -> Credentials {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn entity_prefix(entity_type: EntityType) -> &'static str {
        match entity_type {
            EntityType::Client => "crm.company",
        }
    }

    /// Calls a REST method, refreshing the token once if it was rejected.
    async fn call(&self, method: &str, params: &Value) -> Result<Value, AdapterError> {
        match self.call_once(method, params).await {
            Err(err @ AdapterError::Auth { .. }) => {
                let current = self.credentials();
                if current.access_token.is_none() {
                    return Err(err);
                }
                tracing::info!(method, error = %err, "Bitrix24 token rejected, refreshing");
                self.refresh_token(&current).await?;
                self.call_once(method, params).await
            }
            other => other,
        }
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value, AdapterError> {
        let url = format!("{}/{}.json", self.base_url, method);
        let mut request = self.client.post(&url).json(params);
        if let Some(token) = self.credentials().access_token {
            request = request.query(&[("auth", token)]);
        }

        let response = send(request).await?;
        let body = response.json();

        let error_code = body
            .as_ref()
            .ok()
            .and_then(|json| json.get("error"))
            .and_then(Value::as_str);
        if let Some(code) = error_code {
            if AUTH_ERROR_CODES.contains(&code) {
                return Err(AdapterError::auth(error_message(
                    response.status,
                    &response.body,
                )));
            }
        }

        if !response.is_success() {
            return Err(response.error());
        }
        if error_code.is_some() {
            return Err(AdapterError::remote(
                Some(response.status.as_u16()),
                error_message(response.status, &response.body),
            ));
        }
        body
    }

    async fn refresh_token(&self, current: &Credentials) -> Result<(), AdapterError> {
        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            current.client_id.as_deref(),
            current.client_secret.as_deref(),
            current.refresh_token.as_deref(),
        ) else {
            return Err(AdapterError::auth(
                "access token rejected and no refresh credentials are configured",
            ));
        };

        let request = self.client.get(&self.oauth_url).query(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ]);
        let response = send(request).await?;
        if !response.is_success() {
            return Err(AdapterError::auth(format!(
                "token refresh failed: {}",
                error_message(response.status, &response.body)
            )));
        }

        let json = response
            .json()
            .map_err(|e| AdapterError::auth("token refresh returned a malformed body").with_source(e))?;
        let access_token = json
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AdapterError::auth("token refresh returned no access_token"))?;

        {
            let mut credentials = self
                .credentials
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            credentials.access_token = Some(access_token.to_string());
            if let Some(rotated) = json.get("refresh_token").and_then(Value::as_str) {
                credentials.refresh_token = Some(rotated.to_string());
            }
        }
        self.rotated.store(true, Ordering::SeqCst);
        tracing::info!("Bitrix24 access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl ExternalSystemAdapter for Bitrix24Adapter {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Bitrix24
    }

    async fn list_entities(
        &self,
        entity_type: EntityType,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, AdapterError> {
        let method = format!("{}.list", Self::entity_prefix(entity_type));

        let mut conditions = Map::new();
        if let Some(since) = filter.modified_since {
            conditions.insert(">DATE_MODIFY".into(), json!(since.to_rfc3339()));
        }

        let mut records = Vec::new();
        let mut start: u64 = 0;
        loop {
            let params = json!({
                "order": { "ID": "ASC" },
                "filter": conditions,
                "select": ["*", "UF_*", "PHONE", "EMAIL"],
                "start": start,
            });
            let body = self.call(&method, &params).await?;
            let page = body
                .get("result")
                .and_then(Value::as_array)
                .ok_or_else(|| AdapterError::remote(None, format!("{} returned no result list", method)))?;
            records.extend(page.iter().cloned());

            match body.get("next").and_then(Value::as_u64) {
                Some(next) if next > start => start = next,
                _ => break,
            }
        }

        tracing::debug!(method = %method, count = records.len(), "Bitrix24 records listed");
        Ok(records)
    }

    async fn create_entity(
        &self,
        entity_type: EntityType,
        record: &Value,
    ) -> Result<String, AdapterError> {
        let method = format!("{}.add", Self::entity_prefix(entity_type));
        let params = json!({
            "fields": record,
            "params": { "REGISTER_SONET_EVENT": "N" },
        });

        let body = self.call(&method, &params).await?;
        match body.get("result") {
            Some(Value::Number(id)) => Ok(id.to_string()),
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            _ => Err(AdapterError::remote(None, format!("{} returned no id", method))),
        }
    }

    async fn update_entity(
        &self,
        entity_type: EntityType,
        external_id: &str,
        record: &Value,
    ) -> Result<bool, AdapterError> {
        let prefix = Self::entity_prefix(entity_type);
        let mut fields = record.as_object().cloned().unwrap_or_default();

        if MULTI_FIELDS.iter().any(|key| fields.contains_key(*key)) {
            let body = self
                .call(&format!("{}.get", prefix), &json!({ "id": external_id }))
                .await
                .map_err(missing_as_remote)?;
            align_multi_fields(body.get("result").unwrap_or(&Value::Null), &mut fields);
        }

        let params = json!({ "id": external_id, "fields": fields });
        let body = self
            .call(&format!("{}.update", prefix), &params)
            .await
            .map_err(missing_as_remote)?;
        Ok(matches!(body.get("result"), Some(Value::Bool(true))))
    }

    async fn test_connection(&self) -> bool {
        match self.call("crm.company.fields", &json!({})).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Bitrix24 connection test failed");
                false
            }
        }
    }

    fn take_refreshed_credentials(&self) -> Option<Credentials> {
        if self.rotated.swap(false, Ordering::SeqCst) {
            Some(self.credentials())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::IntegrationOptions;

    fn config(options: IntegrationOptions) -> IntegrationConfig {
        IntegrationConfig {
            id: 1,
            name: "CRM".into(),
            kind: IntegrationKind::Bitrix24,
            base_url: "https://portal.bitrix24.ru/rest/".into(),
            credentials: Credentials::default(),
            options,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_uses_defaults() {
        let adapter =
            Bitrix24Adapter::new(&config(IntegrationOptions::default()), Duration::from_secs(5))
                .unwrap();
        assert_eq!(adapter.base_url, "https://portal.bitrix24.ru/rest");
        assert_eq!(adapter.oauth_url, DEFAULT_OAUTH_URL);
        assert_eq!(adapter.kind(), IntegrationKind::Bitrix24);
        assert!(adapter.take_refreshed_credentials().is_none());
    }

    #[test]
    fn test_new_honors_oauth_override() {
        let options = IntegrationOptions {
            oauth_url: Some("https://oauth.example.test/token/".into()),
            ..Default::default()
        };
        let adapter = Bitrix24Adapter::new(&config(options), Duration::from_secs(5)).unwrap();
        assert_eq!(adapter.oauth_url, "https://oauth.example.test/token/");
    }

    #[test]
    fn test_align_multi_fields_drops_unchanged_value() {
        let stored = json!({
            "PHONE": [
                {"ID": "7", "VALUE": "", "VALUE_TYPE": "WORK"},
                {"ID": "8", "VALUE": "+7 495 000-00-00", "VALUE_TYPE": "WORK"}
            ],
            "EMAIL": [{"ID": "9", "VALUE": "old@romashka.ru", "VALUE_TYPE": "WORK"}]
        });
        let mut fields = json!({
            "TITLE": "Romashka",
            "PHONE": [{"VALUE": " +7 495 000-00-00", "VALUE_TYPE": "WORK"}],
            "EMAIL": [{"VALUE": "info@romashka.ru", "VALUE_TYPE": "WORK"}]
        })
        .as_object()
        .cloned()
        .unwrap();

        align_multi_fields(&stored, &mut fields);

        assert!(!fields.contains_key("PHONE"));
        assert_eq!(fields["EMAIL"][0]["ID"], "9");
        assert_eq!(fields["EMAIL"][0]["VALUE"], "info@romashka.ru");
        assert_eq!(fields["TITLE"], "Romashka");
    }

    #[test]
    fn test_align_multi_fields_appends_when_nothing_stored() {
        let stored = json!({"ID": "15", "PHONE": []});
        let mut fields = json!({"PHONE": [{"VALUE": "+7 812 111-11-11", "VALUE_TYPE": "WORK"}]})
            .as_object()
            .cloned()
            .unwrap();

        align_multi_fields(&stored, &mut fields);

        assert!(fields["PHONE"][0].get("ID").is_none());
    }

    #[test]
    fn test_entity_prefix() {
        assert_eq!(Bitrix24Adapter::entity_prefix(EntityType::Client), "crm.company");
    }
}
