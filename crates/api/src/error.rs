use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::services::SyncError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// An external system rejected or failed a call.
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match err {
            SyncError::IntegrationNotFound(_) | SyncError::NotFound(_) => {
                ApiError::NotFound(message)
            }
            SyncError::IntegrationInactive(_) | SyncError::DuplicateMapping { .. } => {
                ApiError::Conflict(message)
            }
            SyncError::UnsupportedIntegration(_) | SyncError::UnknownOperation(_) => {
                ApiError::Validation(message)
            }
            SyncError::Adapter(_) | SyncError::Mapping(_) | SyncError::RecordsFailed { .. } => {
                ApiError::BadGateway(message)
            }
            SyncError::Storage(_) => ApiError::Internal(message),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();

        let message = if messages.len() == 1 {
            messages.remove(0)
        } else {
            format!("{} validation errors: {}", messages.len(), messages.join("; "))
        };

        ApiError::Validation(message)
    }
}
