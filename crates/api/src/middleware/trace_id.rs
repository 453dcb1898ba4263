//! Request tracing middleware.
//!
//! Provides request ID extraction and generation for log correlation.

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Request ID stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Middleware that extracts or generates a request ID.
///
/// If the `X-Request-ID` header is present, uses that value.
/// Otherwise, generates a new UUID v4. The ID is stored in request
/// extensions, echoed in the response headers and attached to the request
/// span, so sync runs started by the request log under it.
pub async fn trace_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let start = std::time::Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    });

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), header_value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Extension, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(axum::middleware::from_fn(trace_id))
    }

    #[tokio::test]
    async fn test_existing_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "req-123")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-123");
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();
        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_request_id_header_constant() {
        assert_eq!(REQUEST_ID_HEADER, "X-Request-ID");
    }
}
