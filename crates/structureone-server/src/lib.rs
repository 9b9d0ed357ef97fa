//! # StructureOne Server
//!
//! HTTP serving and request dispatch for the StructureOne API runtime.
//!
//! - [`Dispatcher`] turns a request into a response: route resolution,
//!   module loading, error rendering, rate-limit and CORS headers
//! - [`RouteContext`] is what route code receives
//! - [`Server`] runs the hyper accept loop with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use structureone_core::{ApiResponse, TokenService};
//! use structureone_middleware::RateLimiter;
//! use structureone_server::{AppServices, Dispatcher, Routes, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut routes = Routes::new();
//!     routes.legacy("ping").entry(|ctx| Box::pin(async move { Ok(ApiResponse::ok("pong")) }));
//!
//!     let services = AppServices::new(TokenService::new("secret", 3600), RateLimiter::in_memory());
//!     let dispatcher = Arc::new(Dispatcher::new(routes, Arc::new(services)));
//!     Server::new(ServerConfig::default(), dispatcher).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/structureone-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod context;
mod dispatch;
mod error;
mod server;
mod services;
mod shutdown;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_SIZE,
    DEFAULT_PURGE_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use context::RouteContext;
pub use dispatch::{CorsHeaders, Dispatcher, Routes};
pub use error::ServerError;
pub use server::{HttpResponse, Server};
pub use services::AppServices;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
