//! URL path to route descriptor.

use crate::descriptor::RouteDescriptor;

/// Default root for legacy routes.
pub const DEFAULT_LEGACY_ROOT: &str = "core/routes";

/// Default root for versioned route trees.
pub const DEFAULT_VERSION_ROOT: &str = "core/versions";

/// Parses request paths into [`RouteDescriptor`]s.
///
/// Only the route name segment matters; anything after it is ignored, so
/// `/api/posts/12/comments` addresses the `posts` route.
///
/// ```
/// use structureone_router::RouteResolver;
///
/// let resolver = RouteResolver::default();
///
/// let d = resolver.resolve("/api/v2/users", "").unwrap();
/// assert_eq!((d.version(), d.route_name()), ("v2", "users"));
///
/// let d = resolver.resolve("/app/api/test/", "/app").unwrap();
/// assert_eq!((d.version(), d.route_name()), ("legacy", "test"));
///
/// assert!(resolver.resolve("/health", "").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteResolver {
    legacy_root: String,
    version_root: String,
}

impl Default for RouteResolver {
    fn default() -> Self {
        Self::new(DEFAULT_LEGACY_ROOT, DEFAULT_VERSION_ROOT)
    }
}

impl RouteResolver {
    /// Creates a resolver with the given module roots.
    #[must_use]
    pub fn new(legacy_root: impl Into<String>, version_root: impl Into<String>) -> Self {
        Self {
            legacy_root: legacy_root.into(),
            version_root: version_root.into(),
        }
    }

    /// Resolves a request path.
    ///
    /// `base_app_dir` is stripped from the front of the path when present.
    /// Returns `None` when the path is not under `/api/`.
    pub fn resolve(&self, path: &str, base_app_dir: &str) -> Option<RouteDescriptor> {
        let path = if base_app_dir.is_empty() {
            path
        } else {
            path.strip_prefix(base_app_dir).unwrap_or(path)
        };
        let path = path.trim_end_matches('/');

        let mut segments = path.strip_prefix('/')?.split('/');
        if segments.next()? != "api" {
            return None;
        }

        let first = segments.next().filter(|s| !s.is_empty())?;
        match segments.next() {
            Some(name) if is_version(first) && !name.is_empty() => Some(
                RouteDescriptor::versioned(first, name, &self.version_root),
            ),
            _ => Some(RouteDescriptor::legacy(first, self.legacy_root.as_str())),
        }
    }
}

/// `v` followed by one or more ASCII digits.
fn is_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str) -> Option<RouteDescriptor> {
        RouteResolver::default().resolve(path, "")
    }

    #[test]
    fn test_versioned_route() {
        let d = resolve("/api/v2/users").unwrap();
        assert_eq!(d.version(), "v2");
        assert_eq!(d.route_name(), "users");
        assert_eq!(d.base_path(), "core/versions/v2");
        assert!(d.is_versioned());
    }

    #[test]
    fn test_legacy_route() {
        let d = resolve("/api/test").unwrap();
        assert_eq!(d.version(), "legacy");
        assert_eq!(d.route_name(), "test");
        assert_eq!(d.base_path(), "core/routes");
        assert!(!d.is_versioned());
    }

    #[test]
    fn test_non_api_paths() {
        assert!(resolve("/health").is_none());
        assert!(resolve("/").is_none());
        assert!(resolve("").is_none());
        assert!(resolve("/api").is_none());
        assert!(resolve("/api/").is_none());
        assert!(resolve("/apix/test").is_none());
        assert!(resolve("api/test").is_none());
        assert!(resolve("/v1/api/test").is_none());
    }

    #[test]
    fn test_trailing_slashes_trimmed() {
        assert_eq!(resolve("/api/test///").unwrap().route_name(), "test");
        assert_eq!(resolve("/api/v1/test/").unwrap().route_name(), "test");
    }

    #[test]
    fn test_extra_segments_ignored() {
        let d = resolve("/api/posts/12/comments").unwrap();
        assert_eq!(d.route_name(), "posts");
        assert!(!d.is_versioned());

        let d = resolve("/api/v1/posts/12").unwrap();
        assert_eq!((d.version(), d.route_name()), ("v1", "posts"));
    }

    #[test]
    fn test_version_without_name_is_legacy() {
        let d = resolve("/api/v3").unwrap();
        assert_eq!(d.version(), "legacy");
        assert_eq!(d.route_name(), "v3");
    }

    #[test]
    fn test_empty_name_after_version_is_legacy() {
        let d = resolve("/api/v3//x").unwrap();
        assert_eq!(d.route_name(), "v3");
        assert!(!d.is_versioned());
    }

    #[test]
    fn test_empty_first_segment() {
        assert!(resolve("/api//test").is_none());
    }

    #[test]
    fn test_not_a_version() {
        for seg in ["v", "va", "v1a", "V1", "version1"] {
            let d = resolve(&format!("/api/{seg}/users")).unwrap();
            assert_eq!(d.route_name(), seg);
            assert!(!d.is_versioned());
        }
    }

    #[test]
    fn test_base_app_dir_stripped() {
        let resolver = RouteResolver::default();
        let d = resolver.resolve("/myapp/api/v1/test", "/myapp").unwrap();
        assert_eq!(d.to_string(), "v1/test");

        // Prefix is optional.
        let d = resolver.resolve("/api/test", "/myapp").unwrap();
        assert_eq!(d.route_name(), "test");
    }

    #[test]
    fn test_custom_roots() {
        let resolver = RouteResolver::new("routes", "versions");
        assert_eq!(
            resolver.resolve("/api/v9/x", "").unwrap().base_path(),
            "versions/v9"
        );
        assert_eq!(resolver.resolve("/api/x", "").unwrap().base_path(), "routes");
    }
}
