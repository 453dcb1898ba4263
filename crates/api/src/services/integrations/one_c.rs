//! 1C:Enterprise OData adapter.
//!
//! Talks to the standard OData interface of a published information base
//! (`{base_url}/{database}/odata/standard.odata`) with HTTP basic auth.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use domain::models::{EntityType, IntegrationConfig, IntegrationKind, ListFilter};
use domain::services::{AdapterError, ExternalSystemAdapter};

use super::http::{build_client, error_message, send};

pub struct OneCAdapter {
    client: Client,
    root: String,
    username: String,
    password: Option<String>,
}

impl OneCAdapter {
    pub fn new(config: &IntegrationConfig, default_timeout: Duration) -> Result<Self, AdapterError> {
        let username = config
            .credentials
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AdapterError::auth("1C integration has no username"))?;

        let timeout = config
            .options
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default_timeout);

        let base = config.base_url.trim_end_matches('/');
        let root = match config.options.database.as_deref() {
            Some(database) if !database.is_empty() => {
                format!("{}/{}/odata/standard.odata", base, database.trim_matches('/'))
            }
            _ => format!("{}/odata/standard.odata", base),
        };

        Ok(Self {
            client: build_client(timeout)?,
            root,
            username,
            password: config.credentials.password.clone(),
        })
    }

    fn catalog(entity_type: EntityType) -> &'static str {
        match entity_type {
            EntityType::Client => "Catalog_Контрагенты",
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, self.password.as_deref())
            .header(header::ACCEPT, "application/json")
            .query(&[("$format", "json")])
    }
}

#[async_trait]
impl ExternalSystemAdapter for OneCAdapter {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::OneC
    }

    async fn list_entities(
        &self,
        entity_type: EntityType,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, AdapterError> {
        let url = format!("{}/{}", self.root, Self::catalog(entity_type));
        let mut request = self.request(Method::GET, &url);
        if !filter.include_deleted {
            request = request.query(&[("$filter", "DeletionMark eq false")]);
        }

        let body = send(request).await?.into_json()?;
        let records = body
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::remote(None, "OData response has no value list"))?;

        tracing::debug!(catalog = Self::catalog(entity_type), count = records.len(), "1C records listed");
        Ok(records.clone())
    }

    async fn create_entity(
        &self,
        entity_type: EntityType,
        record: &Value,
    ) -> Result<String, AdapterError> {
        let url = format!("{}/{}", self.root, Self::catalog(entity_type));
        let body = send(self.request(Method::POST, &url).json(record))
            .await?
            .into_json()?;

        body.get("Ref_Key")
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AdapterError::remote(None, "created object has no Ref_Key"))
    }

    async fn update_entity(
        &self,
        entity_type: EntityType,
        external_id: &str,
        record: &Value,
    ) -> Result<bool, AdapterError> {
        let key = Uuid::parse_str(external_id).map_err(|e| {
            AdapterError::remote(None, format!("invalid Ref_Key {}", external_id)).with_source(e)
        })?;
        let url = format!(
            "{}/{}(guid'{}')",
            self.root,
            Self::catalog(entity_type),
            key.hyphenated()
        );

        let response = send(self.request(Method::PATCH, &url).json(record)).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(AdapterError::remote(
                Some(404),
                error_message(response.status, &response.body),
            ));
        }
        if !response.is_success() {
            return Err(response.error());
        }
        Ok(true)
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/", self.root);
        match send(self.request(Method::GET, &url)).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                tracing::warn!(error = %response.error(), "1C connection test failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "1C connection test failed");
                false
            }
        }
    }
}
