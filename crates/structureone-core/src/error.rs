//! Error types for StructureOne.
//!
//! [`ApiError`] is returned by every layer of a request: the resolver, the
//! handler loader, each middleware stage and the route code itself. Nothing
//! writes a response on failure; the dispatcher hands the error to
//! [`ResponseFormatter::render_error`](crate::ResponseFormatter::render_error),
//! which is the single place either branch is serialized.
//!
//! | Variant | Status |
//! |---|---|
//! | `RouteNotFound`, `HandlerMissing` | 404 |
//! | `HandlerLoad`, `Internal`, `UnknownStatus` | 500 |
//! | `AuthMissing`, `AuthInvalid` | 401 |
//! | `Forbidden` | 403 |
//! | `BadRequest` | 400 |
//! | `MethodNotAllowed` | 405 |
//! | `RateLimited` | 429 |
//! | `Status` | chosen by the route |

use crate::token::TokenError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::panic::Location;
use thiserror::Error;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// Machine-readable classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No route module is registered for the descriptor.
    RouteNotFound,
    /// The route module has no entry handler.
    HandlerMissing,
    /// A helper module failed while loading.
    HandlerLoad,
    /// No bearer token was presented.
    AuthMissing,
    /// The bearer token failed validation.
    AuthInvalid,
    /// The caller's role is not allowed.
    Forbidden,
    /// Malformed body, missing fields or failed validation.
    BadRequest,
    /// HTTP method not accepted by the route.
    MethodNotAllowed,
    /// Rate limit exceeded.
    RateLimited,
    /// A route-chosen status code.
    Status,
    /// A status code outside the formatter's table.
    UnknownStatus,
    /// Unexpected failure while running route code.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    ///
    /// [`ErrorKind::Status`] has no fixed code; the owning error carries it.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound | Self::HandlerMissing => StatusCode::NOT_FOUND,
            Self::AuthMissing | Self::AuthInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::HandlerLoad | Self::Status | Self::UnknownStatus | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Standard error type for StructureOne.
///
/// # Example
///
/// ```
/// use structureone_core::ApiError;
///
/// fn require_title(title: &str) -> Result<(), ApiError> {
///     if title.len() < 3 {
///         return Err(ApiError::bad_request("Title must be at least 3 characters"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum ApiError {
    /// No route module is registered under the requested name.
    #[error("Route directory '{base_path}/{route}' not found")]
    RouteNotFound {
        /// Requested route name.
        route: String,
        /// Module base path the route was looked up under.
        base_path: String,
    },

    /// The route exists but has no entry handler.
    #[error("Index handler for route '{route}' not found")]
    HandlerMissing {
        /// Requested route name.
        route: String,
    },

    /// A helper module failed during the load phase.
    #[error("Failed to load module '{module}' of route '{route}': {message}")]
    HandlerLoad {
        /// Requested route name.
        route: String,
        /// Module that failed.
        module: String,
        /// Modules that ran before the failure.
        loaded: Vec<String>,
        /// Failure detail.
        message: String,
    },

    /// No bearer token on the request.
    #[error("Authorization token missing")]
    AuthMissing,

    /// The bearer token did not validate.
    #[error("Invalid token: {reason}")]
    AuthInvalid {
        /// Why validation failed.
        #[source]
        reason: TokenError,
    },

    /// Authenticated, but not allowed.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },

    /// The request could not be accepted as sent.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Required fields that were absent or empty.
        missing_fields: Vec<String>,
    },

    /// The route does not accept this HTTP method.
    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        /// Method that was used.
        method: String,
        /// Methods the route accepts.
        allowed: Vec<String>,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited {
        /// Seconds until a slot frees up.
        retry_after: u64,
    },

    /// An error response with a status chosen by route code.
    #[error("Status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message overriding the table default.
        message: Option<String>,
    },

    /// The formatter was asked for a status it does not know.
    #[error("Unrecognized response status {status}")]
    UnknownStatus {
        /// The rejected status code.
        status: u16,
    },

    /// Unexpected failure inside route code.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure detail (only shown in debug mode).
        message: String,
        /// Route module that was executing.
        origin: Option<String>,
        /// Source location that raised the error.
        location: Option<String>,
    },
}

impl ApiError {
    /// Creates a route-not-found error.
    #[must_use]
    pub fn route_not_found(route: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self::RouteNotFound {
            route: route.into(),
            base_path: base_path.into(),
        }
    }

    /// Creates a handler-missing error.
    #[must_use]
    pub fn handler_missing(route: impl Into<String>) -> Self {
        Self::HandlerMissing {
            route: route.into(),
        }
    }

    /// Creates an invalid-token error.
    #[must_use]
    pub const fn auth_invalid(reason: TokenError) -> Self {
        Self::AuthInvalid { reason }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a bad-request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            missing_fields: Vec::new(),
        }
    }

    /// Creates a bad-request error listing missing required fields.
    #[must_use]
    pub fn missing_fields(fields: Vec<String>) -> Self {
        Self::BadRequest {
            message: format!("Missing required fields: {}", fields.join(", ")),
            missing_fields: fields,
        }
    }

    /// Creates a method-not-allowed error.
    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>, allowed: &[&str]) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            allowed: allowed.iter().map(ToString::to_string).collect(),
        }
    }

    /// Creates a rate-limited error.
    #[must_use]
    pub const fn rate_limited(retry_after: u64) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Creates an error response with a route-chosen status code.
    ///
    /// ```
    /// use structureone_core::ApiError;
    ///
    /// let err = ApiError::status(404, "Post not found");
    /// assert_eq!(err.status_code().as_u16(), 404);
    /// ```
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: Some(message.into()),
        }
    }

    /// Creates an internal error, recording the caller's source location.
    #[must_use]
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        let caller = Location::caller();
        Self::Internal {
            message: message.into(),
            origin: None,
            location: Some(format!("{}:{}", caller.file(), caller.line())),
        }
    }

    /// Attaches the executing module to an internal error.
    ///
    /// Other variants are returned unchanged. An origin already set is kept.
    #[must_use]
    pub fn with_origin(self, module: impl Into<String>) -> Self {
        match self {
            Self::Internal {
                message,
                origin: None,
                location,
            } => Self::Internal {
                message,
                origin: Some(module.into()),
                location,
            },
            other => other,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            Self::HandlerMissing { .. } => ErrorKind::HandlerMissing,
            Self::HandlerLoad { .. } => ErrorKind::HandlerLoad,
            Self::AuthMissing => ErrorKind::AuthMissing,
            Self::AuthInvalid { .. } => ErrorKind::AuthInvalid,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Status { .. } => ErrorKind::Status,
            Self::UnknownStatus { .. } => ErrorKind::UnknownStatus,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// A route-chosen status that is not a valid HTTP code maps to 500.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => other.kind().default_status_code(),
        }
    }

    /// Whether the error describes a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<TokenError> for ApiError {
    fn from(reason: TokenError) -> Self {
        Self::AuthInvalid { reason }
    }
}
