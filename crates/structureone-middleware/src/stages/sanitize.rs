//! Field sanitization stage.

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::sanitize::{sanitize, SanitizeKind};
use crate::types::Request;
use structureone_core::{ApiResult, BoxFuture};

/// Cleans configured fields of the collected body data in place.
///
/// Absent fields are skipped.
#[derive(Debug, Clone)]
pub struct SanitizeMiddleware {
    fields: Vec<(String, SanitizeKind)>,
}

impl SanitizeMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(fields: Vec<(String, SanitizeKind)>) -> Self {
        Self { fields }
    }
}

impl Middleware for SanitizeMiddleware {
    fn stage(&self) -> Stage {
        Stage::Sanitize
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            let data = ctx.data_mut();
            for (field, kind) in &self.fields {
                if let Some(value) = data.get_mut(field) {
                    *value = sanitize(*kind, value);
                }
            }
            next.run(ctx, request).await
        })
    }
}
