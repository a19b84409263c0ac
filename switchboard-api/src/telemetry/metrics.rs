//! Prometheus Metrics Definitions
//!
//! Defines the relay metrics with their labels and exposes the `/metrics`
//! endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Upstream call latency buckets (seconds). The CRM is slow; go up to 30s.
const UPSTREAM_LATENCY_BUCKETS: &[f64] = &[0.010, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<SwitchboardMetrics>> = Lazy::new(SwitchboardMetrics::new);

/// The registered metrics, or `None` if registration failed.
///
/// Recording is best effort: a registration failure is logged once and the
/// relay keeps serving.
pub fn metrics() -> Option<&'static SwitchboardMetrics> {
    match METRICS.as_ref() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| tracing::error!(error = %e, "Metrics unavailable"));
            None
        }
    }
}

/// Container for all relay metrics.
#[derive(Clone)]
pub struct SwitchboardMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Tenant cache lookups - labels: result (hit/miss)
    pub tenant_cache_lookups_total: CounterVec,

    /// Upstream CRM calls - labels: operation, outcome (success/error/transport)
    pub upstream_calls_total: CounterVec,

    /// Upstream CRM latency - labels: operation
    pub upstream_call_duration_seconds: HistogramVec,

    /// Webhook events received - labels: kind
    pub webhook_events_total: CounterVec,
}

impl SwitchboardMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "switchboard_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "switchboard_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            tenant_cache_lookups_total: register_counter_vec!(
                "switchboard_tenant_cache_lookups_total",
                "Tenant cache lookups by result",
                &["result"]
            )
            .map_err(|e| registration_error("tenant_cache_lookups_total", e))?,

            upstream_calls_total: register_counter_vec!(
                "switchboard_upstream_calls_total",
                "Upstream CRM calls by operation and outcome",
                &["operation", "outcome"]
            )
            .map_err(|e| registration_error("upstream_calls_total", e))?,

            upstream_call_duration_seconds: register_histogram_vec!(
                "switchboard_upstream_call_duration_seconds",
                "Upstream CRM call duration in seconds",
                &["operation"],
                UPSTREAM_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("upstream_call_duration_seconds", e))?,

            webhook_events_total: register_counter_vec!(
                "switchboard_webhook_events_total",
                "Webhook events received by kind",
                &["kind"]
            )
            .map_err(|e| registration_error("webhook_events_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a tenant cache lookup.
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.tenant_cache_lookups_total
            .with_label_values(&[result])
            .inc();
    }

    /// Record an upstream CRM call.
    pub fn record_upstream_call(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.upstream_calls_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.upstream_call_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record a received webhook event.
    pub fn record_webhook_event(&self, kind: &str) {
        self.webhook_events_total.with_label_values(&[kind]).inc();
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the relay metrics exist even before the first request.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
