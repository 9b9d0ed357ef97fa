//! Core middleware trait and chain.
//!
//! Each stage receives the shared context, the request, and a [`Next`] handle
//! for the rest of the chain. A stage that fails returns its error without
//! calling `next`, which short-circuits every later stage.

use crate::context::MiddlewareContext;
use crate::pipeline::Stage;
use crate::types::Request;
use structureone_core::{ApiResult, BoxFuture};

/// One pipeline stage.
pub trait Middleware: Send + Sync + 'static {
    /// The stage this middleware implements; fixes its position.
    fn stage(&self) -> Stage;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        self.stage().name()
    }

    /// Runs the stage, then (on success) the rest of the chain.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>>;
}

/// The remainder of the chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    End,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    pub(crate) const fn end() -> Self {
        Self {
            inner: NextInner::End,
        }
    }

    /// Invokes the next stage, or returns `Ok` at the end of the chain.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: &Request) -> ApiResult<()> {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                ctx.record_stage(middleware.stage());
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    stage = middleware.name(),
                    "running middleware stage"
                );
                middleware.process(ctx, request, *next).await
            }
            NextInner::End => Ok(()),
        }
    }
}
