//! Integration management and sync endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use domain::models::{
    CreateIntegrationRequest, EnqueueSyncRequest, IntegrationConfig, IntegrationResponse,
    SyncDirection, SyncLog, SyncQueueItem, SyncResult,
};
use shared::pagination::PageQuery;

use crate::app::AppState;
use crate::error::ApiError;

/// Request body for an on-demand client sync.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub direction: SyncDirection,
}

/// Result of an on-demand sync run; `errors` holds the first errors only.
#[derive(Debug, Serialize)]
pub struct SyncRunResponse {
    pub integration_id: i64,
    pub direction: SyncDirection,
    #[serde(flatten)]
    pub result: SyncResult,
    pub total_errors: usize,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTestResponse {
    pub integration_id: i64,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncLogListResponse {
    pub logs: Vec<SyncLog>,
    pub limit: i64,
    pub offset: i64,
}

async fn load_integration(state: &AppState, id: i64) -> Result<IntegrationConfig, ApiError> {
    state
        .integrations
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Integration {} not found", id)))
}

/// Create an integration.
///
/// POST /api/v1/integrations
pub async fn create_integration(
    State(state): State<AppState>,
    Json(request): Json<CreateIntegrationRequest>,
) -> Result<(StatusCode, Json<IntegrationResponse>), ApiError> {
    request.validate()?;

    let created = state.integrations.create(request.into()).await?;

    info!(
        integration_id = created.id,
        kind = %created.kind,
        name = %created.name,
        "Integration created"
    );

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// List integrations with credentials masked.
///
/// GET /api/v1/integrations
pub async fn list_integrations(
    State(state): State<AppState>,
) -> Result<Json<Vec<IntegrationResponse>>, ApiError> {
    let integrations = state.integrations.list().await?;
    Ok(Json(integrations.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/integrations/:id
pub async fn get_integration(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IntegrationResponse>, ApiError> {
    let integration = load_integration(&state, id).await?;
    Ok(Json(integration.into()))
}

/// Probe the external system of an integration.
///
/// POST /api/v1/integrations/:id/test
///
/// An unreachable system is reported as `connected: false`, not as an error.
pub async fn test_connection(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ConnectionTestResponse>, ApiError> {
    let integration = load_integration(&state, id).await?;
    let connected = state.engine.test_connection(&integration).await;

    info!(integration_id = id, connected, "Connection test finished");

    Ok(Json(ConnectionTestResponse {
        integration_id: id,
        connected,
    }))
}

/// Run a client sync and wait for the result.
///
/// POST /api/v1/integrations/:id/sync/clients
pub async fn sync_clients(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncRunResponse>, ApiError> {
    let mut result = state.engine.sync_clients(id, request.direction).await?;

    let total_errors = result.errors.len();
    result.errors.truncate(state.config.sync.max_reported_errors);

    Ok(Json(SyncRunResponse {
        integration_id: id,
        direction: request.direction,
        result,
        total_errors,
    }))
}

/// Queue a sync for background processing.
///
/// POST /api/v1/integrations/:id/queue
pub async fn enqueue_sync(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<EnqueueSyncRequest>,
) -> Result<(StatusCode, Json<SyncQueueItem>), ApiError> {
    request.validate()?;
    load_integration(&state, id).await?;

    let item = state.queue.enqueue(request.into_new_item(id)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Sync log history of an integration, newest first.
///
/// GET /api/v1/integrations/:id/logs?limit=&offset=
pub async fn list_sync_logs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<SyncLogListResponse>, ApiError> {
    load_integration(&state, id).await?;

    let (limit, offset) = page.normalized();
    let logs = state.logs.list_by_integration(id, limit, offset).await?;

    Ok(Json(SyncLogListResponse {
        logs,
        limit,
        offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_request_deserialization() {
        let request: SyncRequest = serde_json::from_str(r#"{"direction":"export"}"#).unwrap();
        assert_eq!(request.direction, SyncDirection::Export);
        assert!(serde_json::from_str::<SyncRequest>(r#"{"direction":"both"}"#).is_err());
    }

    #[test]
    fn test_sync_run_response_flattens_result() {
        let mut result = SyncResult::for_batch(2);
        result.record_failure("ext-1", "boom");
        let response = SyncRunResponse {
            integration_id: 4,
            direction: SyncDirection::Import,
            result,
            total_errors: 1,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["integration_id"], 4);
        assert_eq!(json["direction"], "import");
        assert_eq!(json["records_processed"], 2);
        assert_eq!(json["records_failed"], 1);
        assert_eq!(json["errors"][0], "ext-1: boom");
    }
}
