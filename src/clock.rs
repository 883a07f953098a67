//! Clock abstraction for deterministic testing.
//!
//! Production code uses `SystemClock` (real time).
//! Tests use `TestClock` with manual time advancement.
//! State machines never read a clock directly; they are handed a
//! `Timestamp` taken by whoever drives them.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// Trait abstracting time sources for testability.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;

    /// Returns the current wall-clock time as fractional seconds
    /// since UNIX epoch.
    fn unix_secs(&self) -> f64;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_secs(&self) -> f64 {
        wall_secs_now()
    }
}

/// Test clock with manually controlled time.
pub struct TestClock {
    instant: Mutex<Instant>,
    unix_s: Mutex<f64>,
}

impl TestClock {
    /// Create a test clock starting at the current real time.
    pub fn new() -> Self {
        Self {
            instant: Mutex::new(Instant::now()),
            unix_s: Mutex::new(wall_secs_now()),
        }
    }

    /// Advance time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut inst = self.instant.lock().unwrap();
        *inst += duration;
        let mut secs = self.unix_s.lock().unwrap();
        *secs += duration.as_secs_f64();
    }

    /// Advance time by fractional seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    /// Set the UNIX timestamp explicitly.
    pub fn set_unix_secs(&self, secs: f64) {
        *self.unix_s.lock().unwrap() = secs;
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.instant.lock().unwrap()
    }

    fn unix_secs(&self) -> f64 {
        *self.unix_s.lock().unwrap()
    }
}

/// A single clock reading: monotonic seconds since an epoch plus wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp {
    /// Monotonic seconds since the reader's epoch. Used for all elapsed-time math.
    pub mono_s: f64,
    /// Wall-clock seconds since UNIX epoch. Used to stamp records.
    pub unix_s: f64,
}

impl Timestamp {
    /// Read `clock` relative to `epoch`.
    pub fn read(clock: &dyn Clock, epoch: Instant) -> Self {
        let mono_s = clock
            .now()
            .checked_duration_since(epoch)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            mono_s,
            unix_s: clock.unix_secs(),
        }
    }

    /// Timestamp where wall time equals monotonic time (handy in tests).
    pub fn at(secs: f64) -> Self {
        Self {
            mono_s: secs,
            unix_s: secs,
        }
    }

    /// Monotonic seconds elapsed since `earlier`.
    pub fn since(&self, earlier: &Timestamp) -> f64 {
        self.mono_s - earlier.mono_s
    }
}

fn wall_secs_now() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
