//! Process-wide services shared by every request.

use http::Extensions;
use structureone_core::TokenService;
use structureone_middleware::{PipelineServices, RateLimiter};

/// Everything route code can reach besides its own request.
///
/// Built once at startup and shared behind an `Arc`.
///
/// ```rust
/// use structureone_core::TokenService;
/// use structureone_middleware::RateLimiter;
/// use structureone_server::AppServices;
///
/// #[derive(Clone)]
/// struct SiteName(&'static str);
///
/// let services = AppServices::new(TokenService::new("secret", 3600), RateLimiter::in_memory())
///     .with_debug(true)
///     .with_state(SiteName("demo"));
/// assert_eq!(services.state::<SiteName>().map(|s| s.0), Some("demo"));
/// ```
#[derive(Debug)]
pub struct AppServices {
    pipeline: PipelineServices,
    debug: bool,
    state: Extensions,
}

impl AppServices {
    /// Creates the services with debug mode off and no application state.
    #[must_use]
    pub fn new(tokens: TokenService, limiter: RateLimiter) -> Self {
        Self {
            pipeline: PipelineServices { limiter, tokens },
            debug: false,
            state: Extensions::new(),
        }
    }

    /// Sets debug mode.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Registers a piece of application state, one value per type.
    #[must_use]
    pub fn with_state<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.state.insert(value);
        self
    }

    /// Application state of type `T`, if registered.
    pub fn state<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.state.get::<T>()
    }

    /// Services the middleware stages draw on.
    pub fn pipeline(&self) -> &PipelineServices {
        &self.pipeline
    }

    /// The token service.
    pub fn tokens(&self) -> &TokenService {
        &self.pipeline.tokens
    }

    /// The rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.pipeline.limiter
    }

    /// Whether debug mode is on.
    pub fn is_debug(&self) -> bool {
        self.debug
    }
}
