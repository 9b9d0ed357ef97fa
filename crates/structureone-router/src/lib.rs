//! Route resolution and loading for StructureOne.
//!
//! Requests reach route code in three steps:
//!
//! 1. [`RouteResolver`] turns a URL path into a [`RouteDescriptor`]
//!    (`/api/{name}` for legacy routes, `/api/v{N}/{name}` for versioned ones).
//! 2. [`RouteRegistry`] maps `(version, name)` to a [`RouteModule`], a set of
//!    named helper steps plus one entry handler. The registry is built once at
//!    startup.
//! 3. [`HandlerLoader`] runs the module: the `functions` helper first, the
//!    remaining helpers in lexicographic order, then the entry handler, which
//!    produces the response.
//!
//! # Example
//!
//! ```rust
//! use structureone_router::{RouteRegistry, RouteResolver};
//!
//! struct Ctx;
//!
//! let mut registry = RouteRegistry::<Ctx>::new();
//! registry.legacy("health").functions(|_ctx| Ok(()));
//!
//! let resolver = RouteResolver::default();
//! let descriptor = resolver.resolve("/api/health", "").unwrap();
//! assert!(registry.get(&descriptor).is_some());
//! ```

#![doc(html_root_url = "https://docs.rs/structureone-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod descriptor;
mod loader;
mod registry;
mod resolver;

pub use descriptor::{RouteDescriptor, LEGACY_VERSION};
pub use loader::{HandlerLoader, LoadOutcome, LoadTrace};
pub use registry::{EntryFn, HelperFn, RouteModule, RouteRegistry, ENTRY_MODULE, PRIORITY_MODULE};
pub use resolver::{RouteResolver, DEFAULT_LEGACY_ROOT, DEFAULT_VERSION_ROOT};
