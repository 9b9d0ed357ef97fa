//! # StructureOne Core
//!
//! Core types shared by every layer of the StructureOne API runtime.
//!
//! - [`ApiError`] / [`ApiResult`] - the error type threaded from the resolver to the formatter
//! - [`ResponseFormatter`] / [`ApiResponse`] - status table and JSON envelope
//! - [`TokenService`] - stateless HMAC-signed bearer tokens
//! - [`Clock`] - time source, swappable in tests
//! - [`SharedVars`] - per-request variables passed from route helpers to the entry handler
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/structureone-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod context;
mod error;
mod response;
mod status;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{RequestId, SharedVars};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use response::{ApiResponse, ResponseFormatter};
pub use status::{Category, StatusInfo};
pub use token::{Claims, TokenError, TokenService};

use std::future::Future;
use std::pin::Pin;

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
