//! Time source abstraction.
//!
//! Token expiry and rate-limit windows are both expressed in epoch seconds.
//! Production code uses [`SystemClock`]; tests inject a [`ManualClock`] so
//! windows and expirations can be crossed without sleeping.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// A source of the current time in Unix epoch seconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current time in seconds since the Unix epoch.
    fn now_secs(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the service under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start` epoch seconds.
    #[must_use]
    pub fn new(start: i64) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start)),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::AcqRel);
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemClock.now_secs())
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::Acquire)
    }
}
