//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "mmk_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "mmk_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "mmk_http_requests_in_flight";

    // Generation metrics
    pub const GENERATIONS_TOTAL: &str = "mmk_generations_total";
    pub const GENERATION_DURATION_SECONDS: &str = "mmk_generation_duration_seconds";
    pub const STAGING_DURATION_SECONDS: &str = "mmk_staging_duration_seconds";
    pub const STATUS_EVENTS_TOTAL: &str = "mmk_status_events_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished generation. `outcome` is `succeeded` or the failure kind.
pub fn record_generation(backend: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("backend", backend.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::GENERATIONS_TOTAL, &labels).increment(1);
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record image staging duration.
pub fn record_staging_duration(stager: &str, duration_secs: f64) {
    let labels = [("stager", stager.to_string())];
    histogram!(names::STAGING_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an intermediate status event from a backend.
pub fn record_status_event(backend: &str, event: &str) {
    let labels = [
        ("backend", backend.to_string()),
        ("event", event.to_string()),
    ];
    counter!(names::STATUS_EVENTS_TOTAL, &labels).increment(1);
}

/// Route template for labels, so paths never carry request data.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
