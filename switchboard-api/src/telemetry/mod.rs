//! Switchboard Telemetry - Logging and Metrics
//!
//! Structured JSON logging via `tracing-subscriber` and Prometheus metrics
//! for the relay surface.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, SwitchboardMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
