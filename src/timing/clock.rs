//! Clock abstraction for stopwatches
//!
//! Allows stopwatches to run against:
//! - the monotonic system clock (experiment processes)
//! - a manually advanced clock (tests and synthetic runs)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use web_time::Instant;

/// Source of the current time, in seconds since an arbitrary fixed origin
pub trait Clock {
    fn now(&self) -> f64;
}

/// Monotonic wall clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and hand
/// another to the stopwatch under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `secs` seconds
    pub fn advance(&self, secs: f64) {
        let delta = (secs.max(0.0) * 1_000_000.0).round() as u64;
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}
