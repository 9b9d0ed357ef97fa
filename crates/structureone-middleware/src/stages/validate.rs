//! Custom validation stage.

use crate::config::Validator;
use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::types::Request;
use structureone_core::{ApiError, ApiResult, BoxFuture};

/// Runs a caller-supplied check over the cleaned body data.
///
/// An `Err(message)` becomes a 400 with that message.
#[derive(Clone)]
pub struct ValidateMiddleware {
    validator: Validator,
}

impl ValidateMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }
}

impl std::fmt::Debug for ValidateMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidateMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for ValidateMiddleware {
    fn stage(&self) -> Stage {
        Stage::Validate
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            (self.validator)(ctx.data()).map_err(ApiError::bad_request)?;
            next.run(ctx, request).await
        })
    }
}
