//! Integration tests for the Bitrix24 and 1C HTTP adapters against a mock server.
//!
//! Run with: cargo test --test adapters_integration

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use domain::models::{
    Credentials, EntityType, IntegrationConfig, IntegrationKind, IntegrationOptions, ListFilter,
};
use domain::services::{AdapterError, ExternalSystemAdapter};
use erp_sync_api::services::integrations::{Bitrix24Adapter, OneCAdapter};

const TIMEOUT: Duration = Duration::from_secs(5);
const REF_KEY: &str = "6f2a9a1e-4b7c-11ee-8c99-0242ac120002";

fn integration(
    kind: IntegrationKind,
    base_url: String,
    credentials: Credentials,
    options: IntegrationOptions,
) -> IntegrationConfig {
    IntegrationConfig {
        id: 1,
        name: "test".into(),
        kind,
        base_url,
        credentials,
        options,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Bitrix24
// ============================================================================

fn oauth_credentials() -> Credentials {
    Credentials {
        access_token: Some("old-token".into()),
        refresh_token: Some("refresh-1".into()),
        client_id: Some("local.app".into()),
        client_secret: Some("app-secret".into()),
        ..Credentials::default()
    }
}

fn bitrix24(server: &MockServer, credentials: Credentials) -> Bitrix24Adapter {
    let options = IntegrationOptions {
        oauth_url: Some(format!("{}/oauth/token/", server.uri())),
        ..IntegrationOptions::default()
    };
    let config = integration(
        IntegrationKind::Bitrix24,
        format!("{}/rest", server.uri()),
        credentials,
        options,
    );
    Bitrix24Adapter::new(&config, TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_bitrix24_list_follows_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .and(query_param("auth", "old-token"))
        .and(body_partial_json(json!({"start": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"ID": "1", "TITLE": "A"}, {"ID": "2", "TITLE": "B"}],
            "next": 2,
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .and(body_partial_json(json!({"start": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{"ID": "3", "TITLE": "C"}],
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let records = adapter
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r["ID"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert!(adapter.take_refreshed_credentials().is_none());
}

#[tokio::test]
async fn test_bitrix24_list_sends_modified_since_filter() {
    let server = MockServer::start().await;
    let since = Utc::now();
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .and(body_partial_json(json!({
            "filter": {">DATE_MODIFY": since.to_rfc3339()}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let filter = ListFilter {
        modified_since: Some(since),
        ..ListFilter::default()
    };
    let records = adapter.list_entities(EntityType::Client, &filter).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_bitrix24_refreshes_token_once_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.add.json"))
        .and(query_param("auth", "old-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "expired_token",
            "error_description": "The access token provided has expired."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/token/"))
        .and(query_param("grant_type", "refresh_token"))
        .and(query_param("refresh_token", "refresh-1"))
        .and(query_param("client_id", "local.app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-token",
            "refresh_token": "refresh-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.add.json"))
        .and(query_param("auth", "new-token"))
        .and(body_partial_json(json!({"fields": {"TITLE": "Romashka"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 15})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let id = adapter
        .create_entity(EntityType::Client, &json!({"TITLE": "Romashka"}))
        .await
        .unwrap();
    assert_eq!(id, "15");

    let rotated = adapter.take_refreshed_credentials().unwrap();
    assert_eq!(rotated.access_token.as_deref(), Some("new-token"));
    assert_eq!(rotated.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(rotated.client_secret.as_deref(), Some("app-secret"));
    assert!(adapter.take_refreshed_credentials().is_none());
}

#[tokio::test]
async fn test_bitrix24_second_rejection_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new-token"})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let err = adapter
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Auth { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_bitrix24_failed_refresh_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "expired_token"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let err = adapter
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Auth { .. }), "got {:?}", err);
    assert!(err.to_string().contains("Invalid refresh token"));
    assert!(adapter.take_refreshed_credentials().is_none());
}

#[tokio::test]
async fn test_bitrix24_webhook_mode_never_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "NO_AUTH_FOUND"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, Credentials::default());
    let err = adapter
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Auth { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_bitrix24_remote_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.update.json"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "ERROR_CORE",
            "error_description": "Company is locked"
        })))
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let err = adapter
        .update_entity(EntityType::Client, "15", &json!({"TITLE": "X"}))
        .await
        .unwrap_err();
    match err {
        AdapterError::Remote {
            status, message, ..
        } => {
            assert_eq!(status, Some(400));
            assert!(message.contains("Company is locked"));
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bitrix24_update_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.update.json"))
        .and(body_partial_json(json!({"id": "15"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.update.json"))
        .and(body_partial_json(json!({"id": "16"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": false})))
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    let record = json!({"TITLE": "Romashka"});
    assert!(adapter
        .update_entity(EntityType::Client, "15", &record)
        .await
        .unwrap());
    assert!(!adapter
        .update_entity(EntityType::Client, "16", &record)
        .await
        .unwrap());
}

/// Body of the single `crm.company.update` call the server received.
async fn update_fields(server: &MockServer) -> serde_json::Value {
    let requests = server.received_requests().await.unwrap();
    let updates: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == "/rest/crm.company.update.json")
        .collect();
    assert_eq!(updates.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&updates[0].body).unwrap();
    body["fields"].clone()
}

#[tokio::test]
async fn test_bitrix24_repeated_export_does_not_duplicate_multi_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.get.json"))
        .and(body_partial_json(json!({"id": "15"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "ID": "15",
                "TITLE": "Romashka",
                "PHONE": [{"ID": "31", "VALUE": "+7 495 000-00-00", "VALUE_TYPE": "WORK"}],
                "EMAIL": [{"ID": "32", "VALUE": "info@romashka.ru", "VALUE_TYPE": "WORK"}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&server)
        .await;

    // Same shape the mapper exports for an unchanged client
    let record = json!({
        "TITLE": "Romashka",
        "PHONE": [{"VALUE": "+7 495 000-00-00", "VALUE_TYPE": "WORK"}],
        "EMAIL": [{"VALUE": "info@romashka.ru", "VALUE_TYPE": "WORK"}]
    });
    let adapter = bitrix24(&server, oauth_credentials());
    assert!(adapter
        .update_entity(EntityType::Client, "15", &record)
        .await
        .unwrap());

    let fields = update_fields(&server).await;
    assert_eq!(fields["TITLE"], "Romashka");
    assert!(fields.get("PHONE").is_none());
    assert!(fields.get("EMAIL").is_none());
}

#[tokio::test]
async fn test_bitrix24_changed_multi_field_overwrites_stored_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.get.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "ID": "15",
                "PHONE": [{"ID": "31", "VALUE": "+7 495 000-00-00", "VALUE_TYPE": "WORK"}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .mount(&server)
        .await;

    let record = json!({
        "TITLE": "Romashka",
        "PHONE": [{"VALUE": "+7 495 111-11-11", "VALUE_TYPE": "WORK"}],
        "EMAIL": [{"VALUE": "info@romashka.ru", "VALUE_TYPE": "WORK"}]
    });
    let adapter = bitrix24(&server, oauth_credentials());
    adapter
        .update_entity(EntityType::Client, "15", &record)
        .await
        .unwrap();

    let fields = update_fields(&server).await;
    assert_eq!(
        fields["PHONE"],
        json!([{"ID": "31", "VALUE": "+7 495 111-11-11", "VALUE_TYPE": "WORK"}])
    );
    // Nothing stored yet, so the email is added
    assert_eq!(
        fields["EMAIL"],
        json!([{"VALUE": "info@romashka.ru", "VALUE_TYPE": "WORK"}])
    );
}

#[tokio::test]
async fn test_bitrix24_update_without_multi_fields_skips_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.get.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = bitrix24(&server, oauth_credentials());
    assert!(adapter
        .update_entity(EntityType::Client, "15", &json!({"TITLE": "Romashka"}))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_bitrix24_timeout_is_connectivity_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.list.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let options = IntegrationOptions {
        timeout_secs: Some(1),
        ..IntegrationOptions::default()
    };
    let config = integration(
        IntegrationKind::Bitrix24,
        format!("{}/rest", server.uri()),
        oauth_credentials(),
        options,
    );
    let adapter = Bitrix24Adapter::new(&config, TIMEOUT).unwrap();

    let err = adapter
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Connectivity { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_bitrix24_connection_test() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/crm.company.fields.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"ID": {}}})))
        .mount(&server)
        .await;

    assert!(bitrix24(&server, oauth_credentials()).test_connection().await);

    let config = integration(
        IntegrationKind::Bitrix24,
        "http://127.0.0.1:1/rest".into(),
        Credentials::default(),
        IntegrationOptions::default(),
    );
    let unreachable = Bitrix24Adapter::new(&config, TIMEOUT).unwrap();
    assert!(!unreachable.test_connection().await);
}

// ============================================================================
// 1C
// ============================================================================

/// `admin:secret` in basic auth encoding.
const BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

fn one_c(server: &MockServer, timeout_secs: Option<u64>) -> OneCAdapter {
    let credentials = Credentials {
        username: Some("admin".into()),
        password: Some("secret".into()),
        ..Credentials::default()
    };
    let options = IntegrationOptions {
        database: Some("trade".into()),
        timeout_secs,
        ..IntegrationOptions::default()
    };
    let config = integration(IntegrationKind::OneC, server.uri(), credentials, options);
    OneCAdapter::new(&config, TIMEOUT).unwrap()
}

// Catalog names are Cyrillic and arrive percent-encoded
const CATALOG_PATH: &str = r"^/trade/odata/standard\.odata/Catalog_[^/(]+$";

#[tokio::test]
async fn test_one_c_list_uses_basic_auth_and_json_format() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CATALOG_PATH))
        .and(header("Authorization", BASIC_AUTH))
        .and(query_param("$format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "odata.metadata": "http://localhost/trade/odata/standard.odata/$metadata",
            "value": [
                {"Ref_Key": REF_KEY, "Description": "Romashka", "DeletionMark": false}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = one_c(&server, None)
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Ref_Key"], REF_KEY);
}

#[tokio::test]
async fn test_one_c_list_excludes_deleted_on_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(CATALOG_PATH))
        .and(query_param("$filter", "DeletionMark eq false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let filter = ListFilter {
        include_deleted: false,
        ..ListFilter::default()
    };
    let records = one_c(&server, None)
        .list_entities(EntityType::Client, &filter)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_one_c_create_returns_ref_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(CATALOG_PATH))
        .and(body_partial_json(json!({"Description": "Romashka"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "Ref_Key": REF_KEY,
            "Description": "Romashka"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = one_c(&server, None)
        .create_entity(EntityType::Client, &json!({"Description": "Romashka"}))
        .await
        .unwrap();
    assert_eq!(id, REF_KEY);
}

#[tokio::test]
async fn test_one_c_update_patches_by_guid() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(format!(r"\(guid'{}'\)$", REF_KEY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Ref_Key": REF_KEY})))
        .expect(1)
        .mount(&server)
        .await;

    let updated = one_c(&server, None)
        .update_entity(EntityType::Client, REF_KEY, &json!({"Description": "Romashka"}))
        .await
        .unwrap();
    assert!(updated);
}

#[tokio::test]
async fn test_one_c_update_missing_object_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "odata.error": {"code": "", "message": {"lang": "ru", "value": "Object not found"}}
        })))
        .mount(&server)
        .await;

    let err = one_c(&server, None)
        .update_entity(EntityType::Client, REF_KEY, &json!({}))
        .await
        .unwrap_err();
    match err {
        AdapterError::Remote {
            status, message, ..
        } => {
            assert_eq!(status, Some(404));
            assert!(message.contains("Object not found"));
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_one_c_rejected_credentials_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let adapter = one_c(&server, None);
    let err = adapter
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Auth { .. }), "got {:?}", err);
    assert!(!adapter.test_connection().await);
}

#[tokio::test]
async fn test_one_c_timeout_is_connectivity_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"value": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = one_c(&server, Some(1))
        .list_entities(EntityType::Client, &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Connectivity { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_one_c_connection_test() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade/odata/standard.odata/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    assert!(one_c(&server, None).test_connection().await);
}
