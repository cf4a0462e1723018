//! Elapsed-time accumulator with pause/resume

use super::clock::{Clock, SystemClock};

/// Measures running time, excluding every interval spent paused.
///
/// Not synchronized; callers serialize access.
#[derive(Debug, Clone)]
pub struct Stopwatch<C: Clock = SystemClock> {
    clock: C,
    start_time: f64,
    pause_duration: f64,
    is_paused: bool,
    /// Only meaningful while `is_paused`
    pause_start_time: f64,
}

impl Stopwatch<SystemClock> {
    /// Create a running stopwatch on the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for Stopwatch<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Stopwatch<C> {
    /// Create a running stopwatch on the given clock
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            start_time: now,
            pause_duration: 0.0,
            is_paused: false,
            pause_start_time: now,
        }
    }

    /// Restart from zero in the running state
    pub fn reset(&mut self) {
        self.start_time = self.clock.now();
        self.pause_duration = 0.0;
        self.is_paused = false;
    }

    /// Stop accumulating time. Ignored if already paused.
    pub fn pause(&mut self) {
        if self.is_paused {
            return;
        }
        self.pause_start_time = self.clock.now();
        self.is_paused = true;
    }

    /// Continue accumulating time. Ignored if not paused.
    pub fn resume(&mut self) {
        if !self.is_paused {
            return;
        }
        self.pause_duration += self.clock.now() - self.pause_start_time;
        self.is_paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Total running time in seconds
    pub fn elapsed(&self) -> f64 {
        let now = self.clock.now();
        let current_pause = if self.is_paused {
            now - self.pause_start_time
        } else {
            0.0
        };
        (now - self.start_time - self.pause_duration - current_pause).max(0.0)
    }

    /// Elapsed seconds with four decimals
    pub fn elapsed_short(&self) -> String {
        format!("{:.4}", self.elapsed())
    }
}
