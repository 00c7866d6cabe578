//! Injectable wall clock
//!
//! Token expiry is computed against wall-clock time, so the cache takes a
//! [`Clock`] instead of calling `Utc::now()` directly. Tests drive a
//! [`MockClock`] forward without sleeping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + 'static {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the component under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Start at a fixed, arbitrary instant.
    pub fn new() -> Self {
        let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_else(Utc::now);
        Self::starting_at(start)
    }

    /// Start at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(start)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += duration;
        }
    }

    /// Advance the mock clock by whole seconds
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Jump to `at`, forwards or backwards.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = at;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.current.lock().map(|current| *current).unwrap_or_else(|_| Utc::now())
    }
}
