//! Per-request identity and shared variables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for one request easy to
/// correlate and sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Named values a route's helper modules hand to its entry handler.
///
/// Owned by a single request, so two routes (or two concurrent requests to
/// the same route) can never see each other's variables.
///
/// ```
/// use structureone_core::SharedVars;
///
/// let mut vars = SharedVars::new(false);
/// vars.set("postsPerPage", 20);
/// assert_eq!(vars.get_as::<u32>("postsPerPage"), Some(20));
///
/// assert!(!vars.set_safe("postsPerPage", 50, false));
/// assert_eq!(vars.get_as::<u32>("postsPerPage"), Some(20));
/// assert_eq!(vars.conflicts(), ["postsPerPage"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedVars {
    values: Map<String, Value>,
    conflicts: Vec<String>,
    debug: bool,
}

impl SharedVars {
    /// Creates an empty set. With `debug`, overwrite conflicts are logged.
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Sets a variable unless it already exists.
    ///
    /// Returns `true` if the value was written. Without `force`, an existing
    /// value is kept and the name is recorded as a conflict.
    pub fn set_safe(&mut self, name: impl Into<String>, value: impl Into<Value>, force: bool) -> bool {
        let name = name.into();
        if self.values.contains_key(&name) {
            if !self.conflicts.contains(&name) {
                self.conflicts.push(name.clone());
            }
            if self.debug {
                tracing::warn!(variable = %name, force, "shared variable already defined");
            }
            if !force {
                return false;
            }
        }
        self.values.insert(name, value.into());
        true
    }

    /// Returns a variable's raw value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns a variable deserialized into `T`, or `None` if absent or of
    /// another shape.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether a variable is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Names of all defined variables, in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Names that `set_safe` found already defined.
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }
}
