//! Role authorization stage.

use crate::context::MiddlewareContext;
use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::types::Request;
use serde_json::Value;
use structureone_core::{ApiError, ApiResult, BoxFuture};

/// Allows only callers whose role claim is in an allow-list.
///
/// The claim may be a string or an array of strings; any match is enough.
/// Runs after [`AuthMiddleware`](crate::stages::AuthMiddleware) and fails as
/// unauthenticated when no caller is bound.
#[derive(Debug, Clone)]
pub struct RoleMiddleware {
    roles: Vec<String>,
    claim: String,
}

impl RoleMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(roles: Vec<String>, claim: String) -> Self {
        Self { roles, claim }
    }

    fn allows(&self, value: Option<&Value>) -> bool {
        match value {
            Some(Value::String(role)) => self.roles.iter().any(|r| r == role),
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(Value::as_str)
                .any(|role| self.roles.iter().any(|r| r == role)),
            _ => false,
        }
    }
}

impl Middleware for RoleMiddleware {
    fn stage(&self) -> Stage {
        Stage::Role
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            let user = ctx.user().ok_or(ApiError::AuthMissing)?;
            if !self.allows(user.get(&self.claim)) {
                return Err(ApiError::forbidden(format!(
                    "Requires one of the roles: {}",
                    self.roles.join(", ")
                )));
            }
            next.run(ctx, request).await
        })
    }
}
