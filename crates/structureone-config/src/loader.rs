//! Layered configuration loader.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Defaults
//! 2. A TOML or JSON file
//! 3. `PREFIX__SECTION__KEY` environment variables
//! 4. The flat variables older deployments set (`DEBUG_MODE`, `LOG_LEVEL`,
//!    `APP_URL`, `API_TOKEN_SECRET`, `API_TOKEN_EXP`, `BASE_APP_DIR`)

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{AppConfig, ConfigError, LogFormat, RateStoreKind};

/// Flat environment variables read when [`ConfigLoader::with_legacy_env`] is set.
pub const LEGACY_ENV_VARS: [&str; 6] = [
    "DEBUG_MODE",
    "LOG_LEVEL",
    "APP_URL",
    "API_TOKEN_SECRET",
    "API_TOKEN_EXP",
    "BASE_APP_DIR",
];

/// Configuration loader with layered approach.
///
/// # Example
///
/// ```no_run
/// use structureone_config::ConfigLoader;
///
/// # fn main() -> Result<(), structureone_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("structureone.toml")?
///     .with_dotenv()
///     .with_env_prefix("STRUCTUREONE")
///     .with_legacy_env()
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: AppConfig,
    env_prefix: Option<String>,
    legacy_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            env_prefix: None,
            legacy_env: false,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = AppConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// ```
    /// use structureone_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert!(config.app.debug);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = AppConfig::development();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format follows the extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist, cannot be read, or
    /// does not parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` ("toml" or "json").
    ///
    /// ```
    /// use structureone_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_port = 3000", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.server.http_port, 3000);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::unsupported_format(format)),
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// With prefix "STRUCTUREONE":
    /// - `STRUCTUREONE__SERVER__HTTP_PORT=9000`
    /// - `STRUCTUREONE__RATE_LIMIT__STORE=file`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Also read the flat [`LEGACY_ENV_VARS`], applied after prefixed ones.
    #[must_use]
    pub fn with_legacy_env(mut self) -> Self {
        self.legacy_env = true;
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        self
    }

    /// Finalize: apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment value does not parse or the
    /// final configuration is invalid.
    pub fn load(mut self) -> Result<AppConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        if self.legacy_env {
            for var in LEGACY_ENV_VARS {
                if let Ok(value) = env::var(var) {
                    self.apply_legacy_var(var, &value)?;
                }
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> AppConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<AppConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::unsupported_format(path.display().to_string())),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "HTTP_PORT"] => config.server.http_port = parse_int(key, value)?,
            ["SERVER", "MAX_BODY_SIZE"] => config.server.max_body_size = parse_int(key, value)?,
            ["SERVER", "REQUEST_TIMEOUT_SECS"] => {
                config.server.request_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }

            ["APP", "NAME"] => config.app.name = value.to_string(),
            ["APP", "BASE_APP_DIR"] => config.app.base_app_dir = value.to_string(),
            ["APP", "DEBUG"] => config.app.debug = parse_flag(key, value)?,
            ["APP", "URL"] => config.app.url = value.to_string(),

            ["TOKEN", "SECRET"] => config.token.secret = value.to_string(),
            ["TOKEN", "TTL_SECS"] => config.token.ttl_secs = parse_int(key, value)?,

            ["RATE_LIMIT", "STORE"] => {
                config.rate_limit.store = match value.to_lowercase().as_str() {
                    "memory" => RateStoreKind::Memory,
                    "file" => RateStoreKind::File,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'memory' or 'file'")),
                };
            }
            ["RATE_LIMIT", "DIR"] => {
                config.rate_limit.dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            ["RATE_LIMIT", "DEFAULT_MAX"] => config.rate_limit.default_max = parse_int(key, value)?,
            ["RATE_LIMIT", "DEFAULT_WINDOW_SECS"] => {
                config.rate_limit.default_window_secs = parse_int(key, value)?;
            }

            ["ROUTES", "LEGACY_ROOT"] => config.routes.legacy_root = value.to_string(),
            ["ROUTES", "VERSION_ROOT"] => config.routes.version_root = value.to_string(),

            ["CORS", "ALLOW_ORIGIN"] => config.cors.allow_origin = value.to_string(),
            ["CORS", "ALLOW_METHODS"] => config.cors.allow_methods = value.to_string(),
            ["CORS", "ALLOW_HEADERS"] => config.cors.allow_headers = value.to_string(),

            ["LOGGING", "LEVEL"] => config.logging.level = normalize_level(value),
            ["LOGGING", "FORMAT"] => config.logging.format = parse_format(key, value)?,
            ["LOGGING", "ANSI_ENABLED"] => config.logging.ansi_enabled = parse_flag(key, value)?,

            ["METRICS", "ENABLED"] => config.metrics.enabled = parse_flag(key, value)?,
            ["METRICS", "ADDR"] => config.metrics.addr = value.to_string(),

            // Unknown keys are ignored.
            _ => {}
        }

        Ok(())
    }

    fn apply_legacy_var(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let config = &mut self.config;
        match key {
            "DEBUG_MODE" => config.app.debug = parse_flag(key, value)?,
            "LOG_LEVEL" => config.logging.level = normalize_level(value),
            "APP_URL" => config.app.url = value.to_string(),
            "API_TOKEN_SECRET" => config.token.secret = value.to_string(),
            "API_TOKEN_EXP" => config.token.ttl_secs = parse_int(key, value)?,
            "BASE_APP_DIR" => config.app.base_app_dir = value.trim_end_matches('/').to_string(),
            _ => {}
        }
        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_format(key: &str, value: &str) -> Result<LogFormat, ConfigError> {
    match value.to_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        _ => Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
    }
}

/// `warning` is accepted as a synonym for `warn`.
fn normalize_level(value: &str) -> String {
    match value.to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            [app]
            name = "Demo"
            base_app_dir = "/backend"

            [rate_limit]
            store = "file"
            dir = "/tmp/structureone-rate"
            default_max = 5
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.app.name, "Demo");
        assert_eq!(config.app.base_app_dir, "/backend");
        assert_eq!(config.rate_limit.store, RateStoreKind::File);
        assert_eq!(config.rate_limit.default_max, 5);
        assert_eq!(config.rate_limit.default_window_secs, 60);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"token": {"secret": "s3cret", "ttl_secs": 120}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.token.secret, "s3cret");
        assert_eq!(config.token.ttl_secs, 120);
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(matches!(
            ConfigLoader::new().with_string("", "yaml"),
            Err(ConfigError::UnsupportedFormat { ref name }) if name == "yaml"
        ));
    }

    #[test]
    fn test_loader_rejects_unknown_field() {
        let result = ConfigLoader::new().with_string("[server]\nport = 1", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structureone.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nhttp_port = 9001").unwrap();

        let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();
        assert_eq!(config.server.http_port, 9001);
    }

    #[test]
    fn test_loader_with_file_bad_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structureone.ini");
        fs::write(&path, "x").unwrap();
        assert!(matches!(
            ConfigLoader::new().with_file(&path),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        assert!(matches!(
            ConfigLoader::new().with_file("/nonexistent/structureone.toml"),
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/structureone.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.http_port, 8080);
    }

    #[test]
    fn test_loader_validates() {
        let result = ConfigLoader::new()
            .with_string("[token]\nttl_secs = 0", "toml")
            .unwrap()
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    // Overrides are applied through apply_env_var directly; the crate forbids
    // the unsafe needed to mutate the process environment in tests.

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__HTTP_PORT", "9000", "TEST").unwrap();
        loader.apply_env_var("TEST__SERVER__HTTP_ADDR", "127.0.0.1", "TEST").unwrap();
        assert_eq!(loader.config.server.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_apply_env_var_rate_limit() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__RATE_LIMIT__STORE", "FILE", "TEST").unwrap();
        loader.apply_env_var("TEST__RATE_LIMIT__DIR", "/tmp/rl", "TEST").unwrap();
        assert_eq!(loader.config.rate_limit.store, RateStoreKind::File);
        assert_eq!(loader.config.rate_limit.dir, Some(PathBuf::from("/tmp/rl")));

        assert!(loader.apply_env_var("TEST__RATE_LIMIT__STORE", "redis", "TEST").is_err());
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__TOKEN__TTL_SECS", "soon", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_logging() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__LOGGING__LEVEL", "Warning", "TEST").unwrap();
        loader.apply_env_var("TEST__LOGGING__FORMAT", "pretty", "TEST").unwrap();
        assert_eq!(loader.config.logging.level, "warn");
        assert_eq!(loader.config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        assert!(loader.apply_env_var("TEST__NOPE__KEY", "x", "TEST").is_ok());
        assert!(loader.apply_env_var("TESTX", "x", "TEST").is_err());
    }

    #[test]
    fn test_apply_legacy_vars() {
        let mut loader = ConfigLoader::new();
        loader.apply_legacy_var("DEBUG_MODE", "true").unwrap();
        loader.apply_legacy_var("API_TOKEN_SECRET", "Example_key").unwrap();
        loader.apply_legacy_var("API_TOKEN_EXP", "7200").unwrap();
        loader.apply_legacy_var("BASE_APP_DIR", "/MOLOLO/BACKEND/").unwrap();
        loader.apply_legacy_var("LOG_LEVEL", "error").unwrap();

        let config = loader.load_unvalidated();
        assert!(config.app.debug);
        assert_eq!(config.token.secret, "Example_key");
        assert_eq!(config.token.ttl_secs, 7200);
        assert_eq!(config.app.base_app_dir, "/MOLOLO/BACKEND");
        assert_eq!(config.logging.level, "error");
    }
}
