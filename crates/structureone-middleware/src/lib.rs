//! # StructureOne Middleware
//!
//! The per-route middleware pipeline and the sliding-window rate limiter.
//!
//! Route code describes what it needs with a [`MiddlewareConfig`]; the
//! pipeline built from it runs the configured stages in fixed order (see
//! [`Stage`]) and hands back the cleaned body data and the authenticated
//! caller.
//!
//! ```
//! use structureone_middleware::{MiddlewareConfig, SanitizeKind};
//!
//! let config = MiddlewareConfig::new()
//!     .rate(10, 60)
//!     .auth()
//!     .json(["title", "content"])
//!     .optional("draft", false)
//!     .sanitize("title", SanitizeKind::String);
//! assert!(config.requires_auth());
//! ```

#![doc(html_root_url = "https://docs.rs/structureone-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod context;
pub mod limiter;
mod middleware;
mod pipeline;
mod sanitize;
pub mod stages;
mod types;

pub use config::{MiddlewareConfig, Validator, DEFAULT_ROLE_CLAIM};
pub use context::MiddlewareContext;
pub use limiter::{RateDecision, RateLimitTable, RateLimiter, RateRule};
pub use middleware::{Middleware, Next};
pub use pipeline::{
    BoxedMiddleware, Pipeline, PipelineBuilder, PipelineOutput, PipelineServices, Stage,
};
pub use sanitize::{sanitize, sanitize_str, validate_email, SanitizeKind, UnknownKind};
pub use types::{
    bearer_token, client_ip, query_params, RemoteAddr, Request, BODY_METHODS, UNKNOWN_CLIENT,
};
