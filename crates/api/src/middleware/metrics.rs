//! Prometheus metrics middleware.
//!
//! Provides HTTP request/response metrics collection and export. Sync run,
//! record and queue counters are emitted by the domain crate and exported
//! through the same recorder.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Middleware to record HTTP request metrics.
///
/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

/// Convert HTTP method to string for metric labels.
fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// Handler for /metrics endpoint that returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Initialize the Prometheus metrics recorder.
///
/// Installs the global recorder once; later calls are no-ops.
pub fn init_metrics() -> Result<(), BuildError> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 120.0])?
        .install_recorder()?;

    if PROMETHEUS_HANDLE.set(handle).is_ok() {
        describe_metrics();
    }
    Ok(())
}

fn describe_metrics() {
    describe_counter!("http_requests_total", "HTTP requests by method, path and status");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request latency by method and path"
    );
    describe_counter!("sync_runs_total", "Finished sync runs by direction and status");
    describe_counter!("sync_records_total", "Processed sync records by outcome");
    describe_counter!(
        "sync_queue_items_total",
        "Processed sync queue items by outcome"
    );
    describe_counter!("job_runs_total", "Background job runs by job and outcome");
    describe_histogram!("job_duration_seconds", "Background job run time by job");
    describe_histogram!(
        "database_query_duration_seconds",
        "Database query latency by query and outcome"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_to_str() {
        assert_eq!(method_to_str(&Method::GET), "GET");
        assert_eq!(method_to_str(&Method::POST), "POST");
        assert_eq!(method_to_str(&Method::PATCH), "PATCH");
        assert_eq!(method_to_str(&Method::TRACE), "OTHER");
    }

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[tokio::test]
    async fn test_metrics_handler_renders_after_init() {
        init_metrics().unwrap();
        counter!("sync_runs_total", "direction" => "import", "status" => "completed").increment(1);

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
