//! Prometheus metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `structureone_requests_total` | Counter | `route`, `status` |
//! | `structureone_request_duration_seconds` | Histogram | `route` |
//! | `structureone_rate_limit_rejections_total` | Counter | `resource` |
//! | `structureone_auth_failures_total` | Counter | `reason` |
//! | `structureone_handler_load_failures_total` | Counter | `route` |
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Route label for requests that never resolved to a route.
pub const UNRESOLVED_ROUTE: &str = "-";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the exporter is installed.
    pub enabled: bool,

    /// Scrape endpoint address (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and its HTTP listener.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for a bad address and
/// `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format, if the exporter is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "structureone_requests_total",
        "Total number of API requests processed"
    );
    describe_histogram!(
        "structureone_request_duration_seconds",
        "API request duration in seconds"
    );
    describe_counter!(
        "structureone_rate_limit_rejections_total",
        "Requests rejected by the rate limiter"
    );
    describe_counter!(
        "structureone_auth_failures_total",
        "Requests rejected for a missing or invalid token"
    );
    describe_counter!(
        "structureone_handler_load_failures_total",
        "Route handlers that failed to load or run"
    );
}

/// Records a completed request.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        "structureone_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "structureone_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a rate-limit rejection.
pub fn record_rate_limited(resource: &str) {
    counter!(
        "structureone_rate_limit_rejections_total",
        "resource" => resource.to_string()
    )
    .increment(1);
}

/// Records an authentication failure (`missing` or `invalid`).
pub fn record_auth_failure(reason: &'static str) {
    counter!("structureone_auth_failures_total", "reason" => reason).increment(1);
}

/// Records a route whose handler failed to load or panicked.
pub fn record_load_failure(route: &str) {
    counter!(
        "structureone_handler_load_failures_total",
        "route" => route.to_string()
    )
    .increment(1);
}
