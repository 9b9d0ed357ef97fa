//! Errors raised while assembling an [`AppConfig`](crate::AppConfig).
//!
//! Source problems (a missing file, bad TOML, an unparsable
//! `STRUCTUREONE__*` variable) are reported where they are read. Value
//! problems are reported by [`AppConfig::validate`](crate::AppConfig::validate),
//! naming the dotted field at fault where there is exactly one.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded or was rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The config file exists but could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path of the file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Neither `.toml` nor `.json`.
    #[error("unsupported configuration format: {name}")]
    UnsupportedFormat {
        /// File name or format label that was given.
        name: String,
    },

    /// Malformed TOML.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Malformed JSON.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A single field holds a value the runtime cannot use, such as a zero
    /// `token.ttl_secs` or an empty `token.secret`.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path, e.g. `server.http_port`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `STRUCTUREONE__*` or legacy variable could not be applied.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// Variable name as found in the environment.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// Fields that are only wrong in combination, e.g. a file rate store
    /// without `rate_limit.dir`.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// [`ConfigError::FileNotFound`] for `path`.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// [`ConfigError::ReadError`] wrapping `source`.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::UnsupportedFormat`].
    pub fn unsupported_format(name: impl Into<String>) -> Self {
        Self::UnsupportedFormat { name: name.into() }
    }

    /// [`ConfigError::InvalidValue`] for a dotted field path.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// [`ConfigError::EnvParseError`].
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// [`ConfigError::ValidationError`].
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}
