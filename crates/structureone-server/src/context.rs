//! Per-request context handed to route code.

use bytes::Bytes;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use structureone_core::{ApiError, ApiResult, Claims, RequestId, SharedVars, TokenService};
use structureone_middleware::{
    bearer_token, client_ip, query_params, MiddlewareConfig, MiddlewareContext, Pipeline,
    PipelineOutput, RateDecision, RateLimitTable, RateRule, Request,
};

use crate::services::AppServices;

/// The request plus everything route helpers and the entry handler share.
///
/// Owned by the dispatcher for the duration of one request; helpers get
/// `&mut RouteContext`, so state set in `functions` is visible to `index`.
#[derive(Debug)]
pub struct RouteContext {
    request_id: RequestId,
    request: Request,
    query: HashMap<String, String>,
    client_ip: String,
    vars: SharedVars,
    user: Option<Claims>,
    rate: Option<RateDecision>,
    services: Arc<AppServices>,
}

impl RouteContext {
    /// Creates the context for one request.
    #[must_use]
    pub fn new(request_id: RequestId, request: Request, services: Arc<AppServices>) -> Self {
        let query = query_params(&request);
        let client_ip = client_ip(&request);
        Self {
            request_id,
            request,
            query,
            client_ip,
            vars: SharedVars::new(services.is_debug()),
            user: None,
            rate: None,
            services,
        }
    }

    /// The request's ID.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The full request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// A decoded query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// A request header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// The bearer token, if the request carries one.
    pub fn bearer_token(&self) -> Option<&str> {
        bearer_token(&self.request)
    }

    /// Client IP used for rate limiting.
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// Raw request body.
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Variables shared between route modules.
    pub fn vars(&self) -> &SharedVars {
        &self.vars
    }

    /// Shared variables, for modification.
    pub fn vars_mut(&mut self) -> &mut SharedVars {
        &mut self.vars
    }

    /// Fails with 405 unless the request uses `method`.
    ///
    /// # Errors
    ///
    /// [`ApiError::MethodNotAllowed`] listing `method` as the only allowed one.
    pub fn require_method(&self, method: Method) -> ApiResult<()> {
        self.require_method_in(&[method])
    }

    /// Fails with 405 unless the request uses one of `methods`.
    ///
    /// # Errors
    ///
    /// [`ApiError::MethodNotAllowed`] listing `methods`.
    pub fn require_method_in(&self, methods: &[Method]) -> ApiResult<()> {
        if methods.contains(self.method()) {
            return Ok(());
        }
        let allowed: Vec<&str> = methods.iter().map(Method::as_str).collect();
        Err(ApiError::method_not_allowed(self.method().as_str(), &allowed))
    }

    /// Runs the middleware pipeline `config` describes.
    ///
    /// The rate decision is kept even when a stage fails, so the advisory
    /// headers reach the error response. On success the caller's claims
    /// become [`user`](Self::user).
    ///
    /// # Errors
    ///
    /// The first failing stage's error.
    pub async fn middleware(&mut self, config: &MiddlewareConfig) -> ApiResult<PipelineOutput> {
        let pipeline = Pipeline::from_config(config, self.services.pipeline());
        let mut ctx = MiddlewareContext::with_request_id(self.request_id);
        let result = pipeline.run(&mut ctx, &self.request).await;

        if let Some(decision) = ctx.rate() {
            self.rate = Some(*decision);
        }
        let output = result?;
        if let Some(user) = &output.user {
            self.user = Some(user.clone());
        }
        tracing::debug!(
            request_id = %self.request_id,
            stages = ?pipeline.stage_names(),
            elapsed = ?ctx.elapsed(),
            "middleware passed"
        );
        Ok(output)
    }

    /// Standalone rate check for this client and path.
    ///
    /// # Errors
    ///
    /// [`ApiError::RateLimited`] when over budget; `Internal` if the store fails.
    pub async fn rate_limit(&mut self, max_requests: u32, window_secs: u64) -> ApiResult<RateDecision> {
        let rule = RateRule::new(max_requests, window_secs);
        let path = self.path().to_string();
        self.check_rate(&path, rule).await
    }

    /// Standalone rate check using the rule a table assigns to this path.
    ///
    /// # Errors
    ///
    /// As for [`rate_limit`](Self::rate_limit).
    pub async fn rate_limit_table(&mut self, table: &RateLimitTable) -> ApiResult<RateDecision> {
        let path = self.path().to_string();
        let rule = table.rule_for(&path);
        self.check_rate(&path, rule).await
    }

    async fn check_rate(&mut self, resource: &str, rule: RateRule) -> ApiResult<RateDecision> {
        let decision = self
            .services
            .limiter()
            .check(&self.client_ip, resource, rule)
            .await
            .map_err(|err| ApiError::internal(format!("rate-limit store failure: {err}")))?;
        self.rate = Some(decision);
        if !decision.allowed {
            return Err(ApiError::rate_limited(decision.retry_after.unwrap_or(1)));
        }
        Ok(decision)
    }

    /// Latest rate decision from the pipeline or a standalone check.
    pub fn rate_decision(&self) -> Option<&RateDecision> {
        self.rate.as_ref()
    }

    /// The token service.
    pub fn tokens(&self) -> &TokenService {
        self.services.tokens()
    }

    /// Claims of the caller authenticated by [`middleware`](Self::middleware).
    pub fn user(&self) -> Option<&Claims> {
        self.user.as_ref()
    }

    /// Application state registered at startup.
    pub fn state<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.services.state::<T>()
    }

    /// Whether debug mode is on.
    pub fn is_debug(&self) -> bool {
        self.services.is_debug()
    }
}
