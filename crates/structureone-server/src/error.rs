//! Server error types.

use thiserror::Error;

/// Errors that stop the server from running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured address.
    #[error("Bind error: {0}")]
    BindError(String),

    /// I/O error during server operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
