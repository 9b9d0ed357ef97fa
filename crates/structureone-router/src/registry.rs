//! Explicit `(version, route) -> module` registry.

use crate::descriptor::{RouteDescriptor, LEGACY_VERSION};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use structureone_core::{ApiResponse, ApiResult, BoxFuture};

/// Helper that always runs before the others.
pub const PRIORITY_MODULE: &str = "functions";

/// Name the entry handler reports under.
pub const ENTRY_MODULE: &str = "index";

/// A helper step: prepares shared state for the entry handler.
pub type HelperFn<C> = Arc<dyn Fn(&mut C) -> ApiResult<()> + Send + Sync>;

/// The entry handler: produces the route's response.
pub type EntryFn<C> =
    Arc<dyn for<'a> Fn(&'a mut C) -> BoxFuture<'a, ApiResult<ApiResponse>> + Send + Sync>;

/// The code behind one route.
pub struct RouteModule<C> {
    helpers: BTreeMap<String, HelperFn<C>>,
    entry: Option<EntryFn<C>>,
}

impl<C> Default for RouteModule<C> {
    fn default() -> Self {
        Self {
            helpers: BTreeMap::new(),
            entry: None,
        }
    }
}

impl<C> fmt::Debug for RouteModule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("entry", &self.entry.is_some())
            .finish()
    }
}

impl<C> RouteModule<C> {
    /// Adds (or replaces) a named helper.
    pub fn helper<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut C) -> ApiResult<()> + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(f));
        self
    }

    /// Adds the priority `functions` helper.
    pub fn functions<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut C) -> ApiResult<()> + Send + Sync + 'static,
    {
        self.helper(PRIORITY_MODULE, f)
    }

    /// Sets the entry handler.
    pub fn entry<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, ApiResult<ApiResponse>> + Send + Sync + 'static,
    {
        self.entry = Some(Arc::new(f));
        self
    }

    /// Helper names in execution order: `functions` first, then the rest
    /// lexicographically.
    pub fn load_order(&self) -> Vec<&str> {
        let priority = self
            .helpers
            .contains_key(PRIORITY_MODULE)
            .then_some(PRIORITY_MODULE);
        priority
            .into_iter()
            .chain(
                self.helpers
                    .keys()
                    .map(String::as_str)
                    .filter(|name| *name != PRIORITY_MODULE),
            )
            .collect()
    }

    pub(crate) fn helper_fn(&self, name: &str) -> Option<&HelperFn<C>> {
        self.helpers.get(name)
    }

    pub(crate) fn entry_fn(&self) -> Option<&EntryFn<C>> {
        self.entry.as_ref()
    }

    /// Whether an entry handler is set.
    pub fn has_entry(&self) -> bool {
        self.entry.is_some()
    }
}

/// All routes known to the application.
///
/// ```
/// use structureone_router::{RouteDescriptor, RouteRegistry};
///
/// struct Ctx;
///
/// let mut registry = RouteRegistry::<Ctx>::new();
/// registry.versioned("v1", "test").helper("config", |_| Ok(()));
///
/// let descriptor = RouteDescriptor::versioned("v1", "test", "core/versions");
/// assert!(registry.get(&descriptor).is_some());
/// assert_eq!(registry.len(), 1);
/// ```
pub struct RouteRegistry<C> {
    routes: HashMap<(String, String), RouteModule<C>>,
}

impl<C> Default for RouteRegistry<C> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<C> fmt::Debug for RouteRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.keys())
            .finish()
    }
}

impl<C> RouteRegistry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the module for a legacy route, creating it if needed.
    pub fn legacy(&mut self, route_name: impl Into<String>) -> &mut RouteModule<C> {
        self.module(LEGACY_VERSION, route_name)
    }

    /// Returns the module for a versioned route, creating it if needed.
    pub fn versioned(
        &mut self,
        version: impl Into<String>,
        route_name: impl Into<String>,
    ) -> &mut RouteModule<C> {
        self.module(version, route_name)
    }

    fn module(
        &mut self,
        version: impl Into<String>,
        route_name: impl Into<String>,
    ) -> &mut RouteModule<C> {
        self.routes
            .entry((version.into(), route_name.into()))
            .or_default()
    }

    /// Looks up the module a descriptor addresses.
    pub fn get(&self, descriptor: &RouteDescriptor) -> Option<&RouteModule<C>> {
        self.routes.get(&(
            descriptor.version().to_string(),
            descriptor.route_name().to_string(),
        ))
    }

    /// Registered `(version, route)` pairs, sorted.
    pub fn keys(&self) -> Vec<(&str, &str)> {
        let mut keys: Vec<_> = self
            .routes
            .keys()
            .map(|(v, r)| (v.as_str(), r.as_str()))
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;

    fn noop(_: &mut Ctx) -> ApiResult<()> {
        Ok(())
    }

    #[test]
    fn test_load_order_priority_then_lexicographic() {
        let mut module = RouteModule::<Ctx>::default();
        module
            .helper("zeta", noop)
            .helper("alpha", noop)
            .functions(noop)
            .helper("beta", noop);

        assert_eq!(module.load_order(), ["functions", "alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_load_order_without_priority() {
        let mut module = RouteModule::<Ctx>::default();
        module.helper("b", noop).helper("a", noop);
        assert_eq!(module.load_order(), ["a", "b"]);
    }

    #[test]
    fn test_versions_are_separate() {
        let mut registry = RouteRegistry::<Ctx>::new();
        registry.legacy("test").functions(noop);
        registry.versioned("v1", "test").functions(noop);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys(), [("legacy", "test"), ("v1", "test")]);

        assert!(registry
            .get(&RouteDescriptor::versioned("v2", "test", "core/versions"))
            .is_none());
    }

    #[test]
    fn test_module_reused_on_second_lookup() {
        let mut registry = RouteRegistry::<Ctx>::new();
        registry.legacy("posts").helper("a", noop);
        registry.legacy("posts").helper("b", noop);
        let module = registry
            .get(&RouteDescriptor::legacy("posts", "core/routes"))
            .unwrap();
        assert_eq!(module.load_order(), ["a", "b"]);
        assert!(!module.has_entry());
    }
}
