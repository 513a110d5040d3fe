//! Time abstraction for testability
//!
//! Token expiry math and cache TTLs read the clock through the [`Clock`]
//! trait so tests can advance simulated time without sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use workbridge_common::time::{Clock, MockClock, SystemClock};
//!
//! // Use system clock in production
//! let clock = SystemClock;
//! let now = clock.now();
//!
//! // Use mock clock in tests
//! let mock = MockClock::new();
//! let start = mock.now();
//! mock.advance(Duration::from_secs(5));
//! assert_eq!(mock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};

/// Trait for time operations to enable testing
pub trait Clock: Send + Sync {
    /// Get current instant (monotonic time)
    ///
    /// Returns a monotonic timestamp suitable for measuring durations.
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get the current wall clock time as a UTC timestamp
    fn utc_now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.system_time())
    }
}

/// Real system clock implementation
///
/// Uses the actual system clock for time operations. Use this in production
/// code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock clock for deterministic testing
///
/// Starts at the current real time and only moves when told to. Clones share
/// the same elapsed time, so a clock handed to a component under test can be
/// advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Create a new mock clock anchored at the current real time
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::now(),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }

    /// Set the mock clock to an absolute elapsed time, replacing any
    /// previous elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed = duration;
    }

    /// Get the simulated time elapsed since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        // Test utility: panic on poisoned mutex to fail tests early
        *self.elapsed.lock().expect("mutex poisoned")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        // Test utility: panic on poisoned mutex to fail tests early
        self.start + *self.elapsed.lock().expect("mutex poisoned")
    }

    fn system_time(&self) -> SystemTime {
        // Test utility: panic on poisoned mutex to fail tests early
        self.base_system_time + *self.elapsed.lock().expect("mutex poisoned")
    }
}
