//! The sliding log kept per rate-limit key.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Allowed request count per trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateRule {
    /// Requests admitted per window.
    #[serde(alias = "max")]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(alias = "window")]
    pub window_secs: u64,
}

impl RateRule {
    /// Creates a rule.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    fn window(&self) -> i64 {
        i64::try_from(self.window_secs).unwrap_or(i64::MAX)
    }
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request was admitted.
    pub allowed: bool,
    /// The rule's request limit.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Epoch second at which the oldest counted request leaves the window.
    pub reset_at: i64,
    /// Seconds to wait before retrying, set on rejection.
    pub retry_after: Option<u64>,
}

/// Timestamps of admitted requests for one key, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    /// Storage key this window belongs to.
    pub key: String,
    /// Admission times in epoch seconds.
    pub timestamps: VecDeque<i64>,
    /// Limit applied on the last check.
    pub max_requests: u32,
    /// Window applied on the last check.
    pub window_secs: u64,
}

impl RateWindow {
    /// Creates an empty window for a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Drops timestamps at or before `now - window_secs`.
    pub fn prune(&mut self, now: i64, window_secs: u64) {
        let cutoff = now.saturating_sub(i64::try_from(window_secs).unwrap_or(i64::MAX));
        while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            self.timestamps.pop_front();
        }
    }

    /// Prunes, counts, and admits `now` if the rule allows it.
    pub fn admit(&mut self, now: i64, rule: RateRule) -> RateDecision {
        self.max_requests = rule.max_requests;
        self.window_secs = rule.window_secs;
        self.prune(now, rule.window_secs);

        let count = self.timestamps.len();
        let limit = usize::try_from(rule.max_requests).unwrap_or(usize::MAX);
        if count >= limit {
            let reset_at = self
                .timestamps
                .front()
                .map_or(now.saturating_add(rule.window()), |oldest| {
                    oldest.saturating_add(rule.window())
                });
            let retry_after = u64::try_from(reset_at.saturating_sub(now)).unwrap_or(0).max(1);
            return RateDecision {
                allowed: false,
                limit: rule.max_requests,
                remaining: 0,
                reset_at,
                retry_after: Some(retry_after),
            };
        }

        self.timestamps.push_back(now);
        let oldest = self.timestamps.front().copied().unwrap_or(now);
        RateDecision {
            allowed: true,
            limit: rule.max_requests,
            remaining: u32::try_from(limit - count - 1).unwrap_or(u32::MAX),
            reset_at: oldest.saturating_add(rule.window()),
            retry_after: None,
        }
    }

    /// Whether every timestamp has left the window.
    pub fn is_stale(&self, now: i64) -> bool {
        let cutoff = now.saturating_sub(i64::try_from(self.window_secs).unwrap_or(i64::MAX));
        self.timestamps.back().map_or(true, |newest| *newest <= cutoff)
    }
}
