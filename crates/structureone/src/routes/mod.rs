//! Bundled demo routes.
//!
//! | Path | Module |
//! |------|--------|
//! | `/api/test` | token issue and check |
//! | `/api/v1/test` | versioned greeting |
//! | `/api/posts` | in-memory post CRUD behind the middleware pipeline |
//! | `/api/middlewares` | middleware reference and shared-variable diagnostics |

mod middlewares;
mod posts;

pub use posts::{Post, PostStore, POSTS_PER_PAGE};

use structureone_server::Routes;

/// Registers every bundled route.
pub fn register_routes(routes: &mut Routes) {
    test::register(routes);
    v1_test::register(routes);
    posts::register(routes);
    middlewares::register(routes);
}
