//! Configuration schema types.
//!
//! Every section denies unknown fields and fills absent ones with defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind host (e.g., "0.0.0.0").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Bind port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl ServerSection {
    /// `host:port` string to bind to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_addr, self.http_port)
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            http_port: default_http_port(),
            max_body_size: default_max_body_size(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_request_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Application section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    /// Application name, shown in the welcome response.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Path prefix the API is mounted under (e.g., "/backend"). Empty for root.
    #[serde(default)]
    pub base_app_dir: String,

    /// Debug mode: detailed error bodies and conflict warnings.
    #[serde(default)]
    pub debug: bool,

    /// Public URL of the application.
    #[serde(default = "default_app_url")]
    pub url: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            base_app_dir: String::new(),
            debug: false,
            url: default_app_url(),
        }
    }
}

fn default_app_name() -> String {
    "StructureOne".to_string()
}

fn default_app_url() -> String {
    "http://localhost".to_string()
}

/// Bearer token section.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    /// HMAC signing secret.
    #[serde(default = "default_token_secret")]
    pub secret: String,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: u64,
}

impl std::fmt::Debug for TokenSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSection")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            secret: default_token_secret(),
            ttl_secs: default_token_ttl(),
        }
    }
}

/// Placeholder secret; the binary warns when it is still in use.
pub const DEFAULT_TOKEN_SECRET: &str = "change-me";

fn default_token_secret() -> String {
    DEFAULT_TOKEN_SECRET.to_string()
}

fn default_token_ttl() -> u64 {
    3600
}

/// Where rate-limit windows are kept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateStoreKind {
    /// Process memory.
    #[default]
    Memory,
    /// One JSON file per key under `dir`.
    File,
}

/// Rate limit section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Window storage.
    #[serde(default)]
    pub store: RateStoreKind,

    /// Directory for the file store.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Default request budget per window.
    #[serde(default = "default_rate_max")]
    pub default_max: u32,

    /// Default window length in seconds.
    #[serde(default = "default_rate_window")]
    pub default_window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            store: RateStoreKind::default(),
            dir: None,
            default_max: default_rate_max(),
            default_window_secs: default_rate_window(),
        }
    }
}

fn default_rate_max() -> u32 {
    60
}

fn default_rate_window() -> u64 {
    60
}

/// Route layout section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutesSection {
    /// Base path of unversioned routes.
    #[serde(default = "default_legacy_root")]
    pub legacy_root: String,

    /// Base path of versioned routes; the version is appended.
    #[serde(default = "default_version_root")]
    pub version_root: String,
}

impl Default for RoutesSection {
    fn default() -> Self {
        Self {
            legacy_root: default_legacy_root(),
            version_root: default_version_root(),
        }
    }
}

fn default_legacy_root() -> String {
    "core/routes".to_string()
}

fn default_version_root() -> String {
    "core/versions".to_string()
}

/// CORS headers added to every response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// `Access-Control-Allow-Origin`.
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,

    /// `Access-Control-Allow-Methods`.
    #[serde(default = "default_allow_methods")]
    pub allow_methods: String,

    /// `Access-Control-Allow-Headers`.
    #[serde(default = "default_allow_headers")]
    pub allow_headers: String,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
        }
    }
}

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_allow_methods() -> String {
    "GET, POST, OPTIONS".to_string()
}

fn default_allow_headers() -> String {
    "Content-Type, Authorization".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}
