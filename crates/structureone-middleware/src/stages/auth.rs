//! Bearer token authentication stage.

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::types::{bearer_token, Request};
use structureone_core::{ApiError, ApiResult, BoxFuture, TokenService};

/// Validates `Authorization: Bearer <token>` and binds the claims as the user.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    tokens: TokenService,
}

impl AuthMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

impl Middleware for AuthMiddleware {
    fn stage(&self) -> Stage {
        Stage::Auth
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            let token = bearer_token(request).ok_or(ApiError::AuthMissing)?;
            let claims = self.tokens.validate(token).map_err(|reason| {
                tracing::debug!(request_id = %ctx.request_id(), %reason, "token rejected");
                ApiError::auth_invalid(reason)
            })?;
            ctx.set_user(claims);
            next.run(ctx, request).await
        })
    }
}
