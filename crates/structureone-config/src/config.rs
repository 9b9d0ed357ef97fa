//! Root configuration type.

use serde::{Deserialize, Serialize};

use crate::{
    AppSection, ConfigError, CorsSection, LogFormat, LoggingSection, MetricsSection,
    RateLimitSection, RateStoreKind, RoutesSection, ServerSection, TokenSection,
};

/// Complete StructureOne configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use structureone_config::AppConfig;
///
/// let config = AppConfig::default();
/// assert_eq!(config.server.http_port, 8080);
/// assert_eq!(config.token.ttl_secs, 3600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Application settings.
    #[serde(default)]
    pub app: AppSection,

    /// Bearer token settings.
    #[serde(default)]
    pub token: TokenSection,

    /// Rate limiting settings.
    #[serde(default)]
    pub rate_limit: RateLimitSection,

    /// Route layout.
    #[serde(default)]
    pub routes: RoutesSection,

    /// CORS headers.
    #[serde(default)]
    pub cors: CorsSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl AppConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` or `ConfigError::InvalidValue` if:
    /// - The port is zero
    /// - The token secret is empty or the TTL is not positive
    /// - A rate default is zero
    /// - The file store has no directory
    /// - The metrics address is not a socket address while metrics are enabled
    /// - The base directory is not empty and does not start with '/'
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_port == 0 {
            return Err(ConfigError::invalid_value("server.http_port", "must not be 0"));
        }

        if self.token.secret.is_empty() {
            return Err(ConfigError::invalid_value("token.secret", "must not be empty"));
        }
        if self.token.ttl_secs == 0 {
            return Err(ConfigError::invalid_value("token.ttl_secs", "must be positive"));
        }

        if self.rate_limit.default_max == 0 || self.rate_limit.default_window_secs == 0 {
            return Err(ConfigError::validation_error(
                "rate_limit.default_max and rate_limit.default_window_secs must be positive",
            ));
        }
        if self.rate_limit.store == RateStoreKind::File && self.rate_limit.dir.is_none() {
            return Err(ConfigError::validation_error(
                "rate_limit.dir must be set when store is 'file'",
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        let base = &self.app.base_app_dir;
        if !base.is_empty() && !base.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "app.base_app_dir",
                format!("must start with '/': {base}"),
            ));
        }

        Ok(())
    }

    /// Development preset: debug mode, pretty debug-level logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            app: AppSection {
                debug: true,
                ..AppSection::default()
            },
            logging: LoggingSection {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ansi_enabled: true,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_development_preset() {
        let config = AppConfig::development();
        assert!(config.app.debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_secret() {
        let mut config = AppConfig::default();
        config.token.secret.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "token.secret"
        ));
    }

    #[test]
    fn test_rejects_bad_ttl_and_port() {
        let mut config = AppConfig::default();
        config.token.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.http_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_store_needs_dir() {
        let mut config = AppConfig::default();
        config.rate_limit.store = RateStoreKind::File;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.rate_limit.dir = Some(PathBuf::from("/var/lib/structureone/rate"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_dir_must_be_absolute() {
        let mut config = AppConfig::default();
        config.app.base_app_dir = "backend".into();
        assert!(config.validate().is_err());
        config.app.base_app_dir = "/backend".into();
        assert!(config.validate().is_ok());
    }
}
