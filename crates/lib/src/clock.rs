//! Time source for record timestamps.
//!
//! Backends stamp `created_at` / `updated_at` through a [`Clock`] so tests can
//! pin time with [`FixedClock`] (behind the `testing` feature).
//!
//! ```
//! use kanban_rank::{Clock, SystemClock};
//!
//! let millis = SystemClock.now_millis();
//! assert!(millis > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since the Unix epoch, as stored on boards, lists and cards.
pub type Timestamp = i64;

/// A time provider for record timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now_millis(&self) -> Timestamp;
}

/// Format a stored timestamp as RFC3339 with millisecond precision, falling
/// back to the epoch for out-of-range values.
pub fn to_rfc3339(millis: Timestamp) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

/// Test clock that advances by one millisecond per reading.
///
/// Every call to `now_millis()` returns a distinct, increasing value, which
/// keeps creation order observable in tests without sleeping.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// Create a clock starting at `millis`.
    pub fn new(millis: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: Timestamp) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    /// Current value without advancing.
    pub fn get(&self) -> Timestamp {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_millis(&self) -> Timestamp {
        self.millis.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1_704_067_200_000)
    }
}
