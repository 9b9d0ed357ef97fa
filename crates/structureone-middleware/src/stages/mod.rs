//! The pipeline's stages.

mod auth;
mod body;
mod rate_limit;
mod role;
mod sanitize;
mod validate;

pub use auth::AuthMiddleware;
pub use body::BodyMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use role::RoleMiddleware;
pub use sanitize::SanitizeMiddleware;
pub use validate::ValidateMiddleware;
