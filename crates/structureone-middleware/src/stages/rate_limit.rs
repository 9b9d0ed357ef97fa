//! Rate limiting stage.
//!
//! Keys requests by client IP and request path. The decision is stored on the
//! context whether or not it admits the request, so the advisory headers can
//! be attached to whatever response is finally sent.

use crate::context::MiddlewareContext;
use crate::limiter::{RateLimiter, RateRule};
use crate::middleware::{Middleware, Next};
use crate::pipeline::Stage;
use crate::types::{client_ip, Request};
use structureone_core::{ApiError, ApiResult, BoxFuture};

/// Rejects callers over their sliding-window budget.
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
    rule: RateRule,
}

impl RateLimitMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(limiter: RateLimiter, rule: RateRule) -> Self {
        Self { limiter, rule }
    }
}

impl Middleware for RateLimitMiddleware {
    fn stage(&self) -> Stage {
        Stage::Rate
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            let identifier = client_ip(request);
            let decision = self
                .limiter
                .check(&identifier, request.uri().path(), self.rule)
                .await
                .map_err(|err| ApiError::internal(format!("rate-limit store failure: {err}")))?;
            ctx.set_rate(decision);

            if !decision.allowed {
                return Err(ApiError::rate_limited(decision.retry_after.unwrap_or(1)));
            }
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use bytes::Bytes;
    use std::sync::Arc;
    use structureone_core::{ErrorKind, ManualClock};

    fn request(ip: &str, path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .header("x-forwarded-for", ip)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_limits_per_ip_and_path() {
        let clock = ManualClock::new(1_000);
        let limiter = RateLimiter::in_memory().with_clock(Arc::new(clock.clone()));
        let pipeline = Pipeline::builder()
            .stage(RateLimitMiddleware::new(limiter, RateRule::new(1, 30)))
            .build();

        let mut ctx = MiddlewareContext::new();
        assert!(pipeline.run(&mut ctx, &request("1.1.1.1", "/api/a")).await.is_ok());

        let mut ctx = MiddlewareContext::new();
        let err = pipeline
            .run(&mut ctx, &request("1.1.1.1", "/api/a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(matches!(err, ApiError::RateLimited { retry_after: 30 }));

        let mut ctx = MiddlewareContext::new();
        assert!(pipeline.run(&mut ctx, &request("2.2.2.2", "/api/a")).await.is_ok());
        let mut ctx = MiddlewareContext::new();
        assert!(pipeline.run(&mut ctx, &request("1.1.1.1", "/api/b")).await.is_ok());

        clock.advance(30);
        let mut ctx = MiddlewareContext::new();
        assert!(pipeline.run(&mut ctx, &request("1.1.1.1", "/api/a")).await.is_ok());
    }
}
