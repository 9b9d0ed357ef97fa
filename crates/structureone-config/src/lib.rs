//! # StructureOne Config
//!
//! Typed configuration for the StructureOne API runtime.
//!
//! [`AppConfig`] is assembled by [`ConfigLoader`] from defaults, a TOML or
//! JSON file, a `.env` file and environment variables, then validated.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0"
//! http_port = 8080
//! max_body_size = 1048576
//! request_timeout_secs = 30
//!
//! [app]
//! name = "My API"
//! base_app_dir = "/backend"
//! debug = false
//!
//! [token]
//! secret = "replace me"
//! ttl_secs = 3600
//!
//! [rate_limit]
//! store = "file"
//! dir = "/var/lib/structureone/rate"
//! default_max = 60
//! default_window_secs = 60
//!
//! [routes]
//! legacy_root = "core/routes"
//! version_root = "core/versions"
//!
//! [cors]
//! allow_origin = "*"
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```

#![doc(html_root_url = "https://docs.rs/structureone-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::AppConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, LEGACY_ENV_VARS};
pub use schema::{
    AppSection, CorsSection, LogFormat, LoggingSection, MetricsSection, RateLimitSection,
    RateStoreKind, RoutesSection, ServerSection, TokenSection, DEFAULT_TOKEN_SECRET,
};
