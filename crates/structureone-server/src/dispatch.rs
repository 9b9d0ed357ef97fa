//! Request dispatch: from an HTTP request to a formatted HTTP response.
//!
//! 1. `OPTIONS` is answered with `204` and the CORS headers.
//! 2. Paths outside `/api/` get the welcome response.
//! 3. The route module runs with panics caught and attributed to the module
//!    that was executing.
//! 4. Errors are rendered by [`ResponseFormatter::render_error`].
//! 5. Rate-limit and CORS headers are attached to whatever comes out.
//!
//! Responses the server produces on its own (oversized or stalled bodies) go
//! through [`Dispatcher::reject`] so they carry the same CORS headers.

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use structureone_core::{ApiError, ApiResponse, RequestId, ResponseFormatter};
use structureone_middleware::Request;
use structureone_router::{HandlerLoader, LoadTrace, RouteRegistry, RouteResolver};
use structureone_telemetry::metrics;

use crate::context::RouteContext;
use crate::services::AppServices;

/// Registry type route code registers into.
pub type Routes = RouteRegistry<RouteContext>;

/// CORS headers added to every response.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl Default for CorsHeaders {
    fn default() -> Self {
        Self {
            allow_origin: HeaderValue::from_static("*"),
            allow_methods: HeaderValue::from_static("GET, POST, OPTIONS"),
            allow_headers: HeaderValue::from_static("Content-Type, Authorization"),
        }
    }
}

impl CorsHeaders {
    /// Builds the header set from configured strings.
    ///
    /// # Errors
    ///
    /// Returns the invalid header value's error.
    pub fn new(
        allow_origin: &str,
        allow_methods: &str,
        allow_headers: &str,
    ) -> Result<Self, http::header::InvalidHeaderValue> {
        Ok(Self {
            allow_origin: HeaderValue::from_str(allow_origin)?,
            allow_methods: HeaderValue::from_str(allow_methods)?,
            allow_headers: HeaderValue::from_str(allow_headers)?,
        })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            HeaderName::from_static("access-control-allow-origin"),
            self.allow_origin.clone(),
        );
        headers.insert(
            HeaderName::from_static("access-control-allow-methods"),
            self.allow_methods.clone(),
        );
        headers.insert(
            HeaderName::from_static("access-control-allow-headers"),
            self.allow_headers.clone(),
        );
    }
}

/// Turns requests into responses using the registered routes.
///
/// ```rust
/// use std::sync::Arc;
/// use structureone_core::TokenService;
/// use structureone_middleware::RateLimiter;
/// use structureone_server::{AppServices, Dispatcher, Routes};
///
/// let services = AppServices::new(TokenService::new("secret", 3600), RateLimiter::in_memory());
/// let dispatcher = Dispatcher::new(Routes::new(), Arc::new(services)).with_base_app_dir("/backend");
/// assert_eq!(dispatcher.base_app_dir(), "/backend");
/// ```
#[derive(Debug)]
pub struct Dispatcher {
    resolver: RouteResolver,
    loader: HandlerLoader<RouteContext>,
    services: Arc<AppServices>,
    cors: CorsHeaders,
    base_app_dir: String,
}

impl Dispatcher {
    /// Creates a dispatcher with the default resolver and CORS headers.
    #[must_use]
    pub fn new(routes: Routes, services: Arc<AppServices>) -> Self {
        Self {
            resolver: RouteResolver::default(),
            loader: HandlerLoader::new(Arc::new(routes)),
            services,
            cors: CorsHeaders::default(),
            base_app_dir: String::new(),
        }
    }

    /// Replaces the resolver (module roots).
    #[must_use]
    pub fn with_resolver(mut self, resolver: RouteResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the CORS headers.
    #[must_use]
    pub fn with_cors(mut self, cors: CorsHeaders) -> Self {
        self.cors = cors;
        self
    }

    /// Sets the path prefix the API is mounted under.
    #[must_use]
    pub fn with_base_app_dir(mut self, base_app_dir: impl Into<String>) -> Self {
        self.base_app_dir = base_app_dir.into();
        self
    }

    /// Path prefix the API is mounted under.
    pub fn base_app_dir(&self) -> &str {
        &self.base_app_dir
    }

    /// Shared services.
    pub fn services(&self) -> &Arc<AppServices> {
        &self.services
    }

    /// Handles one request. Never fails: every error becomes a response.
    pub async fn dispatch(&self, request: Request) -> http::Response<Bytes> {
        self.handle(request, None).await
    }

    /// Like [`dispatch`](Self::dispatch), but route code that runs longer
    /// than `limit` is abandoned with `504`. Rate-limit headers recorded
    /// before the deadline are kept.
    pub async fn dispatch_within(&self, request: Request, limit: Duration) -> http::Response<Bytes> {
        self.handle(request, Some(limit)).await
    }

    /// Renders an error raised outside route code, with CORS headers.
    pub fn reject(&self, err: &ApiError) -> http::Response<Bytes> {
        self.finish(ResponseFormatter::render_error(err, self.services.is_debug()))
    }

    /// Converts a response for the wire and adds the CORS headers.
    pub fn finish(&self, response: ApiResponse) -> http::Response<Bytes> {
        let mut response = response.into_http();
        self.cors.apply(response.headers_mut());
        response
    }

    async fn handle(&self, request: Request, limit: Option<Duration>) -> http::Response<Bytes> {
        let started = Instant::now();
        let request_id = RequestId::new();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        if method == Method::OPTIONS {
            let mut response = http::Response::new(Bytes::new());
            *response.status_mut() = StatusCode::NO_CONTENT;
            self.cors.apply(response.headers_mut());
            return response;
        }

        let Some(descriptor) = self.resolver.resolve(&path, &self.base_app_dir) else {
            let response = self.finish(welcome_response());
            metrics::record_request(metrics::UNRESOLVED_ROUTE, 200, started.elapsed());
            return response;
        };
        let route = descriptor.to_string();

        let mut ctx = RouteContext::new(request_id, request, Arc::clone(&self.services));
        let mut trace = LoadTrace::new();
        let load = AssertUnwindSafe(self.loader.load(&descriptor, &mut ctx, &mut trace)).catch_unwind();
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, load).await.unwrap_or_else(|_| {
                tracing::warn!(request_id = %request_id, route = %route, "route execution timed out");
                Ok(Err(ApiError::status(504, "Route execution timed out")))
            }),
            None => load.await,
        };

        let api_response = match outcome {
            Ok(Ok(loaded)) => {
                tracing::debug!(
                    request_id = %request_id,
                    route = %route,
                    modules = ?loaded.loaded_modules,
                    "route loaded"
                );
                loaded.response
            }
            Ok(Err(err)) => self.render_error(&err, &route, &path, request_id),
            Err(panic) => {
                let err = panic_error(panic.as_ref(), &trace);
                self.render_error(&err, &route, &path, request_id)
            }
        };

        let mut response = self.finish(api_response);
        if let Some(decision) = ctx.rate_decision() {
            decision.apply_headers(response.headers_mut());
        }

        let status = response.status().as_u16();
        let elapsed = started.elapsed();
        metrics::record_request(&route, status, elapsed);
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            route = %route,
            status,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "request completed"
        );
        response
    }

    fn render_error(&self, err: &ApiError, route: &str, path: &str, request_id: RequestId) -> ApiResponse {
        match err {
            ApiError::RateLimited { .. } => metrics::record_rate_limited(path),
            ApiError::AuthMissing => metrics::record_auth_failure("missing"),
            ApiError::AuthInvalid { .. } => metrics::record_auth_failure("invalid"),
            ApiError::HandlerLoad { .. } | ApiError::Internal { .. } => {
                metrics::record_load_failure(route);
            }
            _ => {}
        }

        if err.is_server_error() {
            tracing::error!(request_id = %request_id, route, error = %err, "request failed");
        } else {
            tracing::debug!(request_id = %request_id, route, error = %err, "request rejected");
        }
        ResponseFormatter::render_error(err, self.services.is_debug())
    }
}

fn welcome_response() -> ApiResponse {
    ApiResponse::ok("API System is running")
        .with_field("welcome", "Welcome to the API system")
        .with_field("usage", "Access routes via /api/{route_name}")
        .with_field("example", "/api/test")
}

fn panic_error(panic: &(dyn Any + Send), trace: &LoadTrace) -> ApiError {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    ApiError::Internal {
        message: format!("route code panicked: {detail}"),
        origin: trace.current().map(str::to_string),
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;
    use serde_json::Value;
    use structureone_core::{ApiResult, BoxFuture, TokenService};
    use structureone_middleware::{MiddlewareConfig, RateLimiter};

    fn ok_index(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        Box::pin(async move {
            let name: String = ctx.vars().get_as("name").unwrap_or_default();
            Ok(ApiResponse::ok(format!("hello {name}")))
        })
    }

    fn panicking_index(_ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        Box::pin(async move {
            let explode = true;
            if explode {
                panic!("boom");
            }
            Ok(ApiResponse::ok("unreachable"))
        })
    }

    fn limited_index(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        Box::pin(async move {
            ctx.middleware(&MiddlewareConfig::new().rate(1, 60)).await?;
            Ok(ApiResponse::ok("limited"))
        })
    }

    fn slow_index(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        Box::pin(async move {
            ctx.rate_limit(5, 60).await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(ApiResponse::ok("finally"))
        })
    }

    fn dispatcher(debug: bool) -> Dispatcher {
        let mut routes = Routes::new();
        routes
            .legacy("hello")
            .functions(|ctx: &mut RouteContext| {
                ctx.vars_mut().set("name", "world");
                Ok(())
            })
            .entry(ok_index);
        routes.legacy("crash").entry(panicking_index);
        routes.legacy("limited").entry(limited_index);
        routes.legacy("empty").functions(|_| Ok(()));
        routes.legacy("slow").entry(slow_index);

        let services = AppServices::new(TokenService::new("dispatch-secret", 60), RateLimiter::in_memory())
            .with_debug(debug);
        Dispatcher::new(routes, Arc::new(services))
    }

    fn request(method: &str, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    fn body(response: &http::Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_options_is_no_content() {
        let response = dispatcher(false).dispatch(request("OPTIONS", "/api/anything")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_empty());
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_welcome_response() {
        let response = dispatcher(false).dispatch(request("GET", "/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body(&response);
        assert_eq!(body["message"], "API System is running");
        assert_eq!(body["example"], "/api/test");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_helpers_run_before_entry() {
        let response = dispatcher(false).dispatch(request("GET", "/api/hello")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["message"], "hello world");
        assert_eq!(response.headers()["access-control-allow-methods"], "GET, POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_unknown_route_names_requested_route() {
        let response = dispatcher(false).dispatch(request("GET", "/api/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body(&response);
        assert_eq!(body["status"], "error");
        assert_eq!(body["requested_route"], "nope");
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let response = dispatcher(false).dispatch(request("GET", "/api/empty")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["requested_route"], "empty");
    }

    #[tokio::test]
    async fn test_panic_is_internal_error() {
        let response = dispatcher(false).dispatch(request("GET", "/api/crash")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&response);
        assert!(body.get("error").is_none());
        assert!(body.get("origin").is_none());
    }

    #[tokio::test]
    async fn test_panic_detail_in_debug_mode() {
        let response = dispatcher(true).dispatch(request("GET", "/api/crash")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&response);
        assert_eq!(body["origin"], "index");
        assert!(body["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_rate_headers_on_success_and_rejection() {
        let dispatcher = dispatcher(false);

        let first = dispatcher.dispatch(request("GET", "/api/limited")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["x-ratelimit-limit"], "1");
        assert_eq!(first.headers()["x-ratelimit-remaining"], "0");

        let second = dispatcher.dispatch(request("GET", "/api/limited")).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
        let retry_after = body(&second)["retry_after"].as_u64().unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    #[tokio::test]
    async fn test_timeout_keeps_rate_and_cors_headers() {
        let response = dispatcher(false)
            .dispatch_within(request("GET", "/api/slow"), Duration::from_millis(50))
            .await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body(&response)["message"], "Route execution timed out");
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_dispatch_within_passes_fast_routes() {
        let response = dispatcher(false)
            .dispatch_within(request("GET", "/api/hello"), Duration::from_secs(5))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reject_adds_cors_headers() {
        let response = dispatcher(false).reject(&ApiError::status(413, "Request body too large"));
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert_eq!(body(&response)["message"], "Request body too large");
    }

    #[tokio::test]
    async fn test_base_app_dir_is_stripped() {
        let dispatcher = dispatcher(false).with_base_app_dir("/backend");
        let response = dispatcher.dispatch(request("GET", "/backend/api/hello")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
