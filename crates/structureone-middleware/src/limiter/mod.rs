//! Sliding-log rate limiting.
//!
//! Every admitted request's timestamp is kept for one window, and a request
//! is admitted while fewer than `max_requests` timestamps remain in the
//! trailing window. Unlike fixed buckets there is no burst at bucket edges;
//! the cost is one timestamp per admitted request per key.
//!
//! # Example
//!
//! ```
//! use structureone_middleware::limiter::{RateLimiter, RateRule};
//!
//! # async fn example() {
//! let limiter = RateLimiter::in_memory();
//! let rule = RateRule::new(2, 60);
//! assert!(limiter.check("10.0.0.1", "/api/login", rule).await.unwrap().allowed);
//! assert!(limiter.check("10.0.0.1", "/api/login", rule).await.unwrap().allowed);
//! assert!(!limiter.check("10.0.0.1", "/api/login", rule).await.unwrap().allowed);
//! # }
//! ```

mod store;
mod window;

pub use store::{FileStore, MemoryStore, RateLimitStore, StoreError};
pub use window::{RateDecision, RateRule, RateWindow};

use http::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use structureone_core::{Clock, SystemClock};

/// Rate limit header names.
pub mod headers {
    /// Maximum requests allowed in the window.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Remaining requests in current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
    /// Unix timestamp when the oldest counted request leaves the window.
    pub const RESET: &str = "x-ratelimit-reset";
    /// Seconds to wait before retrying (on 429).
    pub const RETRY_AFTER: &str = "retry-after";
}

impl RateDecision {
    /// Writes the advisory headers. `Retry-After` only on rejection.
    pub fn apply_headers(&self, target: &mut HeaderMap) {
        target.insert(HeaderName::from_static(headers::LIMIT), HeaderValue::from(self.limit));
        target.insert(
            HeaderName::from_static(headers::REMAINING),
            HeaderValue::from(self.remaining),
        );
        target.insert(
            HeaderName::from_static(headers::RESET),
            HeaderValue::from(self.reset_at),
        );
        if let Some(retry_after) = self.retry_after {
            target.insert(
                HeaderName::from_static(headers::RETRY_AFTER),
                HeaderValue::from(retry_after),
            );
        }
    }
}

/// Per-path rules with a fallback.
///
/// ```
/// use structureone_middleware::limiter::{RateLimitTable, RateRule};
///
/// let table = RateLimitTable::new(RateRule::new(60, 60))
///     .with_rule("/api/login", RateRule::new(5, 300));
///
/// assert_eq!(table.rule_for("/api/login"), RateRule::new(5, 300));
/// assert_eq!(table.rule_for("/api/other"), RateRule::new(60, 60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitTable {
    rules: HashMap<String, RateRule>,
    default: RateRule,
}

impl RateLimitTable {
    /// Creates a table with only a default rule.
    #[must_use]
    pub fn new(default: RateRule) -> Self {
        Self {
            rules: HashMap::new(),
            default,
        }
    }

    /// Adds a rule for an exact request path.
    #[must_use]
    pub fn with_rule(mut self, path: impl Into<String>, rule: RateRule) -> Self {
        self.rules.insert(path.into(), rule);
        self
    }

    /// Rule for a path, or the default.
    pub fn rule_for(&self, path: &str) -> RateRule {
        self.rules.get(path).copied().unwrap_or(self.default)
    }
}

/// Checks identifiers against rules using a [`RateLimitStore`].
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter over a store, using the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates a limiter over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Storage key: hex SHA-256 of `identifier:resource`.
    pub fn storage_key(identifier: &str, resource: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identifier.as_bytes());
        hasher.update(b":");
        hasher.update(resource.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Checks one request from `identifier` against `resource`'s rule.
    pub async fn check(
        &self,
        identifier: &str,
        resource: &str,
        rule: RateRule,
    ) -> Result<RateDecision, StoreError> {
        let key = Self::storage_key(identifier, resource);
        let decision = self.store.admit(&key, self.clock.now_secs(), rule).await?;
        if !decision.allowed {
            tracing::info!(
                identifier,
                resource,
                limit = decision.limit,
                retry_after = decision.retry_after,
                "rate limit exceeded"
            );
        }
        Ok(decision)
    }

    /// Checks using the rule a table assigns to `path`.
    pub async fn check_table(
        &self,
        identifier: &str,
        path: &str,
        table: &RateLimitTable,
    ) -> Result<RateDecision, StoreError> {
        self.check(identifier, path, table.rule_for(path)).await
    }

    /// Drops windows that no longer hold any timestamps.
    pub fn purge(&self) -> usize {
        self.store.purge(self.clock.now_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structureone_core::ManualClock;

    const T0: i64 = 1_700_000_000;

    fn limiter(clock: &ManualClock) -> RateLimiter {
        RateLimiter::in_memory().with_clock(Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_three_per_minute() {
        let clock = ManualClock::new(T0);
        let limiter = limiter(&clock);
        let rule = RateRule::new(3, 60);

        for _ in 0..3 {
            assert!(limiter.check("ip", "/api/test", rule).await.unwrap().allowed);
            clock.advance(1);
        }

        let rejected = limiter.check("ip", "/api/test", rule).await.unwrap();
        assert!(!rejected.allowed);
        assert!(rejected.retry_after.unwrap() > 0);

        clock.advance(60);
        assert!(limiter.check("ip", "/api/test", rule).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_identifiers_and_resources_are_independent() {
        let clock = ManualClock::new(T0);
        let limiter = limiter(&clock);
        let rule = RateRule::new(1, 60);

        assert!(limiter.check("a", "/x", rule).await.unwrap().allowed);
        assert!(limiter.check("b", "/x", rule).await.unwrap().allowed);
        assert!(limiter.check("a", "/y", rule).await.unwrap().allowed);
        assert!(!limiter.check("a", "/x", rule).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_check_table_uses_path_rule() {
        let clock = ManualClock::new(T0);
        let limiter = limiter(&clock);
        let table = RateLimitTable::new(RateRule::new(100, 60))
            .with_rule("/api/login", RateRule::new(1, 300));

        assert!(limiter.check_table("ip", "/api/login", &table).await.unwrap().allowed);
        let rejected = limiter.check_table("ip", "/api/login", &table).await.unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, Some(300));

        let other = limiter.check_table("ip", "/api/search", &table).await.unwrap();
        assert_eq!(other.limit, 100);
        assert_eq!(other.remaining, 99);
    }

    #[test]
    fn test_storage_key_is_hex_sha256() {
        let key = RateLimiter::storage_key("1.2.3.4", "/api/test");
        assert_eq!(key.len(), 64);
        assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(key, RateLimiter::storage_key("1.2.3.4", "/api/other"));
        // Separator keeps ("ab", "c") apart from ("a", "bc").
        assert_ne!(
            RateLimiter::storage_key("ab", "c"),
            RateLimiter::storage_key("a", "bc")
        );
    }

    #[test]
    fn test_apply_headers() {
        let mut map = HeaderMap::new();
        RateDecision {
            allowed: false,
            limit: 10,
            remaining: 0,
            reset_at: T0 + 60,
            retry_after: Some(45),
        }
        .apply_headers(&mut map);

        assert_eq!(map.get("X-RateLimit-Limit").unwrap(), "10");
        assert_eq!(map.get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(map.get("X-RateLimit-Reset").unwrap(), "1700000060");
        assert_eq!(map.get("Retry-After").unwrap(), "45");
    }

    #[test]
    fn test_apply_headers_no_retry_when_allowed() {
        let mut map = HeaderMap::new();
        RateDecision {
            allowed: true,
            limit: 10,
            remaining: 9,
            reset_at: T0,
            retry_after: None,
        }
        .apply_headers(&mut map);
        assert!(map.get(headers::RETRY_AFTER).is_none());
    }
}
