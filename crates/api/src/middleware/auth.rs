//! Authentication middleware.
//!
//! The management API has a single admin credential. Its SHA-256 digest is
//! configured in `security.admin_api_key_hash`; the plain key is sent in the
//! `X-API-Key` header.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying the admin API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Middleware for admin-only routes.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if is_admin_key(key, &state.config.security.admin_api_key_hash) => {
            next.run(req).await
        }
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "Rejected invalid API key");
            unauthorized_response()
        }
        None => unauthorized_response(),
    }
}

fn is_admin_key(presented: &str, expected_hash: &str) -> bool {
    !presented.is_empty()
        && !expected_hash.is_empty()
        && shared::crypto::verify_key_hash(presented, expected_hash)
}

fn unauthorized_response() -> Response {
    ApiError::Unauthorized("Invalid or missing API key".into()).into_response()
}
