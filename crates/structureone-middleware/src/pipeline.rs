//! Ordered middleware pipeline.
//!
//! Stages always run in this order, whatever order they were configured in:
//!
//! 1. **Rate** - sliding-log rate limit per client and path
//! 2. **Auth** - bearer token validation, binds the caller's claims
//! 3. **Role** - allow-list check on a claim of the bound caller
//! 4. **Body** - JSON object body, required fields, optional defaults
//! 5. **Sanitize** - per-field cleaning
//! 6. **Validate** - custom predicate over the collected data
//!
//! The first failing stage ends the run; later stages are never entered.

use crate::config::MiddlewareConfig;
use crate::context::MiddlewareContext;
use crate::limiter::RateLimiter;
use crate::middleware::{Middleware, Next};
use crate::stages::{
    AuthMiddleware, BodyMiddleware, RateLimitMiddleware, RoleMiddleware, SanitizeMiddleware,
    ValidateMiddleware,
};
use crate::types::Request;
use serde_json::{Map, Value};
use std::sync::Arc;
use structureone_core::{ApiResult, Claims, TokenService};

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Shared services the stages draw on.
#[derive(Debug, Clone)]
pub struct PipelineServices {
    /// Limiter used by the rate stage.
    pub limiter: RateLimiter,
    /// Token service used by the auth stage.
    pub tokens: TokenService,
}

/// What a successful run hands back to route code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    /// Validated, sanitized body data.
    pub data: Map<String, Value>,
    /// Claims of the authenticated caller.
    pub user: Option<Claims>,
}

/// A built pipeline.
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Builds the stages a configuration asks for.
    #[must_use]
    pub fn from_config(config: &MiddlewareConfig, services: &PipelineServices) -> Self {
        let mut builder = Self::builder();
        if let Some(rule) = config.rate {
            builder = builder.stage(RateLimitMiddleware::new(services.limiter.clone(), rule));
        }
        if config.auth {
            builder = builder.stage(AuthMiddleware::new(services.tokens.clone()));
        }
        if let Some(roles) = &config.roles {
            builder = builder.stage(RoleMiddleware::new(roles.clone(), config.role_claim.clone()));
        }
        if config.parses_body() {
            builder = builder.stage(BodyMiddleware::new(
                config.required.clone().unwrap_or_default(),
                config.optional.clone(),
            ));
        }
        if !config.sanitize.is_empty() {
            builder = builder.stage(SanitizeMiddleware::new(config.sanitize.clone()));
        }
        if let Some(validator) = &config.validate {
            builder = builder.stage(ValidateMiddleware::new(Arc::clone(validator)));
        }
        builder.build()
    }

    /// Runs every stage in order.
    ///
    /// On success the collected data and caller are returned; on failure the
    /// failing stage's error is. Either way `ctx` keeps what the stages
    /// recorded, including the rate decision.
    pub async fn run(
        &self,
        ctx: &mut MiddlewareContext,
        request: &Request,
    ) -> ApiResult<PipelineOutput> {
        self.build_chain().run(ctx, request).await?;
        Ok(PipelineOutput {
            data: ctx.data().clone(),
            user: ctx.user().cloned(),
        })
    }

    fn build_chain(&self) -> Next<'_> {
        let mut next = Next::end();
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Stage order of this pipeline.
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|m| m.stage()).collect()
    }

    /// Stage names, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Collects stages and fixes their order.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline, ordering stages by [`Stage`].
    ///
    /// Stages of the same kind keep the order they were added in.
    #[must_use]
    pub fn build(mut self) -> Pipeline {
        self.stages.sort_by_key(|m| m.stage());
        Pipeline {
            stages: self.stages,
        }
    }
}

/// Middleware stage marker for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: Rate limiting
    Rate = 1,
    /// Stage 2: Bearer token authentication
    Auth = 2,
    /// Stage 3: Role authorization
    Role = 3,
    /// Stage 4: Body parsing and required fields
    Body = 4,
    /// Stage 5: Sanitization
    Sanitize = 5,
    /// Stage 6: Custom validation
    Validate = 6,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Auth => "auth",
            Self::Role => "role",
            Self::Body => "body",
            Self::Sanitize => "sanitize",
            Self::Validate => "validate",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 6] {
        [
            Self::Rate,
            Self::Auth,
            Self::Role,
            Self::Body,
            Self::Sanitize,
            Self::Validate,
        ]
    }
}
