//! HTTP plumbing shared by the external system adapters.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use domain::services::AdapterError;

/// Longest response excerpt copied into an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Builds a client whose every call is bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, AdapterError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("erp-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AdapterError::connectivity("cannot build HTTP client").with_source(e))
}

/// Classifies a failure to send a request or read its body.
pub(crate) fn transport_error(err: reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::connectivity("request timed out").with_source(err)
    } else if err.is_decode() {
        let status = err.status().map(|s| s.as_u16());
        AdapterError::remote(status, "malformed response body").with_source(err)
    } else {
        AdapterError::connectivity("request failed").with_source(err)
    }
}

/// Classifies a non-success HTTP status.
pub(crate) fn status_error(status: StatusCode, message: String) -> AdapterError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::auth(message),
        StatusCode::NOT_FOUND => AdapterError::not_found(message),
        _ => AdapterError::remote(Some(status.as_u16()), message),
    }
}

/// Extracts a readable message from an error response body.
///
/// Understands OAuth (`error_description`, `error`) and OData
/// (`odata.error.message.value`) bodies and falls back to a body excerpt.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["error_description", "error"]
            .iter()
            .find_map(|key| json.get(key).and_then(Value::as_str))
            .or_else(|| {
                json.pointer("/odata.error/message/value")
                    .and_then(Value::as_str)
            })
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });

    let detail = detail.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
            let excerpt: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{}...", excerpt)
        } else {
            trimmed.to_string()
        }
    });

    if detail.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), detail)
    }
}

/// A fully read response.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parses the body; a non-JSON body is a `Remote` error.
    pub fn json(&self) -> Result<Value, AdapterError> {
        serde_json::from_str(&self.body).map_err(|e| {
            AdapterError::remote(Some(self.status.as_u16()), "malformed JSON response")
                .with_source(e)
        })
    }

    /// The classified error for a non-success response.
    pub fn error(&self) -> AdapterError {
        status_error(self.status, error_message(self.status, &self.body))
    }

    /// Parses the body of a successful response.
    pub fn into_json(self) -> Result<Value, AdapterError> {
        if !self.is_success() {
            return Err(self.error());
        }
        self.json()
    }
}

/// Sends a request and reads the whole body.
pub(crate) async fn send(request: RequestBuilder) -> Result<RawResponse, AdapterError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    Ok(RawResponse { status, body })
}
