//! Per-invocation middleware configuration.

use crate::limiter::RateRule;
use crate::sanitize::SanitizeKind;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Claim compared against the allowed roles unless overridden.
pub const DEFAULT_ROLE_CLAIM: &str = "role";

/// Custom validation over the collected body data.
///
/// `Err` carries the message returned to the client.
pub type Validator = Arc<dyn Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync>;

/// Which stages to run for one route invocation, and how.
///
/// # Example
///
/// ```
/// use structureone_middleware::{MiddlewareConfig, SanitizeKind};
///
/// let config = MiddlewareConfig::new()
///     .rate(10, 60)
///     .auth()
///     .json(["title", "content"])
///     .optional("draft", false)
///     .sanitize("title", SanitizeKind::String)
///     .validate(|data| {
///         let title = data["title"].as_str().unwrap_or_default();
///         if title.chars().count() < 3 {
///             return Err("Title must be at least 3 characters".into());
///         }
///         Ok(())
///     });
/// assert!(config.requires_auth());
/// ```
#[derive(Clone)]
pub struct MiddlewareConfig {
    pub(crate) rate: Option<RateRule>,
    pub(crate) auth: bool,
    pub(crate) roles: Option<Vec<String>>,
    pub(crate) role_claim: String,
    pub(crate) required: Option<Vec<String>>,
    pub(crate) optional: Map<String, Value>,
    pub(crate) sanitize: Vec<(String, SanitizeKind)>,
    pub(crate) validate: Option<Validator>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            rate: None,
            auth: false,
            roles: None,
            role_claim: DEFAULT_ROLE_CLAIM.to_string(),
            required: None,
            optional: Map::new(),
            sanitize: Vec::new(),
            validate: None,
        }
    }
}

impl fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareConfig")
            .field("rate", &self.rate)
            .field("auth", &self.auth)
            .field("roles", &self.roles)
            .field("role_claim", &self.role_claim)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("sanitize", &self.sanitize)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

impl MiddlewareConfig {
    /// An empty configuration; no stages run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits callers to `max` requests per `window_secs`.
    #[must_use]
    pub fn rate(mut self, max: u32, window_secs: u64) -> Self {
        self.rate = Some(RateRule::new(max, window_secs));
        self
    }

    /// Requires a valid bearer token.
    #[must_use]
    pub fn auth(mut self) -> Self {
        self.auth = true;
        self
    }

    /// Requires the token's role claim to be one of `roles`.
    #[must_use]
    pub fn role<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Compares roles against `claim` instead of `role`.
    #[must_use]
    pub fn role_claim(mut self, claim: impl Into<String>) -> Self {
        self.role_claim = claim.into();
        self
    }

    /// Requires a JSON object body with these non-empty fields.
    #[must_use]
    pub fn json<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = Some(required.into_iter().map(Into::into).collect());
        self
    }

    /// Fills `field` with `default` when the body omits it.
    #[must_use]
    pub fn optional(mut self, field: impl Into<String>, default: impl Into<Value>) -> Self {
        self.optional.insert(field.into(), default.into());
        self
    }

    /// Cleans `field` with `kind` before custom validation.
    #[must_use]
    pub fn sanitize(mut self, field: impl Into<String>, kind: SanitizeKind) -> Self {
        self.sanitize.push((field.into(), kind));
        self
    }

    /// Runs a custom check over the collected data.
    #[must_use]
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validator));
        self
    }

    /// Whether a token is required.
    pub fn requires_auth(&self) -> bool {
        self.auth
    }

    /// Whether the body stage runs.
    pub fn parses_body(&self) -> bool {
        self.required.is_some() || !self.optional.is_empty()
    }
}
