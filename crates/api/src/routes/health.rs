//! Health check endpoint handlers.

use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Upper bound on the database probe so probes answer promptly.
const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn probe_database(state: &AppState) -> DatabaseHealth {
    let start = Instant::now();
    let connected = matches!(
        tokio::time::timeout(DB_PROBE_TIMEOUT, persistence::db::ping(&state.pool)).await,
        Ok(Ok(()))
    );
    DatabaseHealth {
        connected,
        latency_ms: connected.then(|| start.elapsed().as_millis() as u64),
    }
}

/// Full health check endpoint.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = probe_database(&state).await;
    let status = if database.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if database.connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    };

    (status, Json(response))
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK if the service can accept traffic (database connected).
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    if probe_database(&state).await.connected {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
