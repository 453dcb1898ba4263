//! Sync queue endpoint handlers.

use axum::{
    extract::{Path, State},
    Json,
};

use domain::models::SyncQueueItem;
use domain::services::QueueRunStats;

use crate::app::AppState;
use crate::error::ApiError;

/// GET /api/v1/queue/:item_id
pub async fn get_queue_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> Result<Json<SyncQueueItem>, ApiError> {
    let item = state
        .queue
        .get(item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Queue item {} not found", item_id)))?;
    Ok(Json(item))
}

/// Drain due queue items now instead of waiting for the background job.
///
/// POST /api/v1/queue/process
pub async fn process_queue(State(state): State<AppState>) -> Json<QueueRunStats> {
    Json(state.queue.process_queue().await)
}
