//! # StructureOne Telemetry
//!
//! Structured logging via `tracing-subscriber` and Prometheus metrics via
//! the `metrics` crate.
//!
//! ```rust,ignore
//! use structureone_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! init_telemetry(&LogConfig::default(), &MetricsConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/structureone-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(logging: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(logging)?;
    init_metrics(metrics)?;
    Ok(())
}
