//! Resolved route identity.

use std::fmt;

/// Version label of routes outside any `v{N}` tree.
pub const LEGACY_VERSION: &str = "legacy";

/// Which route module a request addresses.
///
/// Created per request by [`RouteResolver`](crate::RouteResolver) and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteDescriptor {
    version: String,
    route_name: String,
    base_path: String,
    is_versioned: bool,
}

impl RouteDescriptor {
    /// Describes a route under the legacy root.
    #[must_use]
    pub fn legacy(route_name: impl Into<String>, legacy_root: impl Into<String>) -> Self {
        Self {
            version: LEGACY_VERSION.to_string(),
            route_name: route_name.into(),
            base_path: legacy_root.into(),
            is_versioned: false,
        }
    }

    /// Describes a route under `<version_root>/<version>`.
    #[must_use]
    pub fn versioned(
        version: impl Into<String>,
        route_name: impl Into<String>,
        version_root: &str,
    ) -> Self {
        let version = version.into();
        Self {
            base_path: format!("{}/{version}", version_root.trim_end_matches('/')),
            version,
            route_name: route_name.into(),
            is_versioned: true,
        }
    }

    /// `"legacy"` or `"v{N}"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The route name segment.
    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    /// Directory-style path the route lives under.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Whether the route was addressed through a `v{N}` segment.
    pub fn is_versioned(&self) -> bool {
        self.is_versioned
    }

    /// `base_path/route_name`.
    pub fn module_path(&self) -> String {
        format!("{}/{}", self.base_path, self.route_name)
    }
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_versioned {
            write!(f, "{}/{}", self.version, self.route_name)
        } else {
            f.write_str(&self.route_name)
        }
    }
}
