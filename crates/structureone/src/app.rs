//! Wiring an [`AppConfig`] into a running dispatcher and server.

use std::sync::Arc;
use std::time::Duration;

use structureone_config::{AppConfig, LogFormat, RateStoreKind};
use structureone_core::TokenService;
use structureone_middleware::limiter::{FileStore, StoreError};
use structureone_middleware::{RateLimiter, RateRule};
use structureone_router::RouteResolver;
use structureone_server::{AppServices, CorsHeaders, Dispatcher, Routes, ServerConfig};
use structureone_telemetry::{LogConfig, MetricsConfig};
use thiserror::Error;

use crate::routes::{self, PostStore};

/// Errors raised while assembling the dispatcher.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The file rate store was selected without a directory.
    #[error("rate_limit.store = \"file\" requires rate_limit.dir")]
    MissingRateDir,

    /// The rate store could not be opened.
    #[error(transparent)]
    RateStore(#[from] StoreError),

    /// A configured CORS value is not a valid header value.
    #[error("invalid CORS header value: {0}")]
    Cors(#[from] http::header::InvalidHeaderValue),
}

/// Builds a dispatcher serving the bundled routes.
///
/// # Errors
///
/// Returns [`BuildError`] if the rate store cannot be opened or a CORS value
/// is not a valid header.
pub fn build_dispatcher(config: &AppConfig) -> Result<Dispatcher, BuildError> {
    let mut routes = Routes::new();
    routes::register_routes(&mut routes);
    build_dispatcher_with(config, routes)
}

/// Builds a dispatcher serving caller-supplied routes.
///
/// The shared state the bundled routes rely on ([`PostStore`] and the
/// default [`RateRule`]) is registered either way.
///
/// # Errors
///
/// As for [`build_dispatcher`].
pub fn build_dispatcher_with(config: &AppConfig, routes: Routes) -> Result<Dispatcher, BuildError> {
    let limiter = match config.rate_limit.store {
        RateStoreKind::Memory => RateLimiter::in_memory(),
        RateStoreKind::File => {
            let dir = config.rate_limit.dir.clone().ok_or(BuildError::MissingRateDir)?;
            RateLimiter::new(Arc::new(FileStore::open(dir)?))
        }
    };
    let tokens = TokenService::new(config.token.secret.as_str(), config.token.ttl_secs);
    let default_rule = RateRule::new(config.rate_limit.default_max, config.rate_limit.default_window_secs);

    let services = AppServices::new(tokens, limiter)
        .with_debug(config.app.debug)
        .with_state(PostStore::new())
        .with_state(default_rule);

    let cors = CorsHeaders::new(
        &config.cors.allow_origin,
        &config.cors.allow_methods,
        &config.cors.allow_headers,
    )?;
    let resolver = RouteResolver::new(config.routes.legacy_root.as_str(), config.routes.version_root.as_str());

    tracing::debug!(
        store = ?config.rate_limit.store,
        base_app_dir = %config.app.base_app_dir,
        debug = config.app.debug,
        "dispatcher assembled"
    );

    Ok(Dispatcher::new(routes, Arc::new(services))
        .with_resolver(resolver)
        .with_cors(cors)
        .with_base_app_dir(config.app.base_app_dir.trim_end_matches('/')))
}

/// Server settings from the `[server]` section.
pub fn server_config(config: &AppConfig) -> ServerConfig {
    ServerConfig::builder()
        .http_addr(config.server.bind_addr())
        .max_body_size(config.server.max_body_size)
        .request_timeout(Duration::from_secs(config.server.request_timeout_secs))
        .shutdown_timeout(Duration::from_secs(config.server.shutdown_timeout_secs))
        .build()
}

/// Logging settings from the `[logging]` section.
pub fn log_config(config: &AppConfig) -> LogConfig {
    LogConfig {
        enabled: true,
        level: config.logging.level.clone(),
        json_format: config.logging.format == LogFormat::Json,
        ansi: config.logging.ansi_enabled,
        file_line_info: config.app.debug,
    }
}

/// Metrics settings from the `[metrics]` section.
pub fn metrics_config(config: &AppConfig) -> MetricsConfig {
    MetricsConfig {
        enabled: config.metrics.enabled,
        addr: config.metrics.addr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structureone_config::ConfigLoader;

    #[test]
    fn test_server_config_from_sections() {
        let config = ConfigLoader::new()
            .with_string(
                "[server]\nhttp_addr = \"127.0.0.1\"\nhttp_port = 9000\nrequest_timeout_secs = 5\n",
                "toml",
            )
            .unwrap()
            .load()
            .unwrap();
        let server = server_config(&config);
        assert_eq!(server.http_addr(), "127.0.0.1:9000");
        assert_eq!(server.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_log_config_follows_format() {
        let mut config = AppConfig::default();
        config.logging.format = LogFormat::Pretty;
        config.app.debug = true;
        let log = log_config(&config);
        assert!(!log.json_format);
        assert!(log.file_line_info);
    }

    #[test]
    fn test_file_store_requires_dir() {
        let mut config = AppConfig::default();
        config.rate_limit.store = RateStoreKind::File;
        assert!(matches!(build_dispatcher(&config), Err(BuildError::MissingRateDir)));
    }

    #[test]
    fn test_file_store_opens_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.rate_limit.store = RateStoreKind::File;
        config.rate_limit.dir = Some(dir.path().join("rates"));
        assert!(build_dispatcher(&config).is_ok());
        assert!(dir.path().join("rates").is_dir());
    }

    #[test]
    fn test_invalid_cors_value() {
        let mut config = AppConfig::default();
        config.cors.allow_origin = "bad\nvalue".into();
        assert!(matches!(build_dispatcher(&config), Err(BuildError::Cors(_))));
    }

    #[test]
    fn test_base_app_dir_trailing_slash_trimmed() {
        let mut config = AppConfig::default();
        config.app.base_app_dir = "/backend/".into();
        let dispatcher = build_dispatcher(&config).unwrap();
        assert_eq!(dispatcher.base_app_dir(), "/backend");
    }
}
