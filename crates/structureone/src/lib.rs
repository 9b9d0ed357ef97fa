//! # StructureOne
//!
//! A minimal HTTP API runtime. Requests under `/api/` resolve to route
//! modules: a set of helper steps that prepare shared variables, then one
//! entry handler. Route code opts into a middleware pipeline per request:
//!
//! ```text
//! rate limit → auth → role → JSON body → sanitize → validate → handler
//! ```
//!
//! Every response, success or error, is a JSON envelope
//! `{"status", "message", ...data}`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use structureone::prelude::*;
//!
//! fn hello(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
//!     Box::pin(async move {
//!         let out = ctx.middleware(&MiddlewareConfig::new().rate(10, 60).auth()).await?;
//!         Ok(ApiResponse::ok("hello").with_field("user", out.user.unwrap_or_default()))
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().with_defaults().load()?;
//!     let mut routes = Routes::new();
//!     routes.legacy("hello").entry(hello);
//!
//!     let dispatcher = structureone::build_dispatcher_with(&config, routes)?;
//!     Server::new(structureone::server_config(&config), dispatcher.into()).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/structureone/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
pub mod routes;

pub use app::{build_dispatcher, build_dispatcher_with, log_config, metrics_config, server_config, BuildError};

// Re-export core types
pub use structureone_core as core;

// Re-export routing types
pub use structureone_router as router;

// Re-export middleware types
pub use structureone_middleware as middleware;

// Re-export configuration types
pub use structureone_config as config;

// Re-export telemetry setup
pub use structureone_telemetry as telemetry;

// Re-export server types
pub use structureone_server as server;

/// Prelude for route code.
///
/// ```rust,ignore
/// use structureone::prelude::*;
/// ```
pub mod prelude {
    pub use structureone_config::{AppConfig, ConfigLoader};
    pub use structureone_core::{
        ApiError, ApiResponse, ApiResult, BoxFuture, Claims, ResponseFormatter, TokenService,
    };
    pub use structureone_middleware::{
        MiddlewareConfig, RateLimitTable, RateLimiter, RateRule, SanitizeKind,
    };
    pub use structureone_server::{
        AppServices, Dispatcher, RouteContext, Routes, Server, ServerConfig, ShutdownSignal,
    };
}
