//! Running a route module.

use crate::descriptor::RouteDescriptor;
use crate::registry::{RouteRegistry, ENTRY_MODULE};
use std::sync::Arc;
use structureone_core::{ApiError, ApiResponse, ApiResult};

/// A successfully run route.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Response produced by the entry handler.
    pub response: ApiResponse,
    /// Helpers that ran, in order, followed by the entry module.
    pub loaded_modules: Vec<String>,
}

/// Progress record kept outside the load future.
///
/// If route code panics the future is dropped mid-flight; the trace still
/// says which module was executing and which had finished.
#[derive(Debug, Default, Clone)]
pub struct LoadTrace {
    loaded: Vec<String>,
    current: Option<String>,
}

impl LoadTrace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules that completed.
    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }

    /// Module executing when the load stopped, if it did not finish.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn enter(&mut self, module: &str) {
        self.current = Some(module.to_string());
    }

    fn finish(&mut self) {
        if let Some(module) = self.current.take() {
            self.loaded.push(module);
        }
    }
}

/// Executes registered route modules.
pub struct HandlerLoader<C> {
    registry: Arc<RouteRegistry<C>>,
}

impl<C> Clone for HandlerLoader<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<C> std::fmt::Debug for HandlerLoader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerLoader")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<C: Send> HandlerLoader<C> {
    /// Creates a loader over a registry.
    #[must_use]
    pub fn new(registry: Arc<RouteRegistry<C>>) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    pub fn registry(&self) -> &RouteRegistry<C> {
        &self.registry
    }

    /// Runs the route a descriptor addresses.
    ///
    /// # Errors
    ///
    /// - [`ApiError::RouteNotFound`] if nothing is registered for the descriptor
    /// - [`ApiError::HandlerMissing`] if the module has no entry handler
    /// - [`ApiError::HandlerLoad`] if a helper fails; the error lists the
    ///   helpers that already ran
    /// - whatever the entry handler returns, with internal errors tagged as
    ///   originating in `index`
    pub async fn load(
        &self,
        descriptor: &RouteDescriptor,
        ctx: &mut C,
        trace: &mut LoadTrace,
    ) -> ApiResult<LoadOutcome> {
        let module = self.registry.get(descriptor).ok_or_else(|| {
            ApiError::route_not_found(descriptor.route_name(), descriptor.base_path())
        })?;
        let entry = module
            .entry_fn()
            .ok_or_else(|| ApiError::handler_missing(descriptor.route_name()))?;

        for name in module.load_order() {
            let Some(helper) = module.helper_fn(name) else {
                continue;
            };
            trace.enter(name);
            tracing::debug!(route = %descriptor, module = name, "loading helper module");
            if let Err(err) = helper(ctx) {
                tracing::warn!(route = %descriptor, module = name, error = %err, "helper module failed");
                return Err(ApiError::HandlerLoad {
                    route: descriptor.route_name().to_string(),
                    module: name.to_string(),
                    loaded: trace.loaded().to_vec(),
                    message: err.to_string(),
                });
            }
            trace.finish();
        }

        trace.enter(ENTRY_MODULE);
        let response = entry(ctx).await.map_err(|err| err.with_origin(ENTRY_MODULE))?;
        trace.finish();

        Ok(LoadOutcome {
            response,
            loaded_modules: trace.loaded().to_vec(),
        })
    }
}
