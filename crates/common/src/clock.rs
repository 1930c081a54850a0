//! Clock and timing utilities for bounded analysis waits.
//!
//! Both analysis transports block on an external process with a time budget.
//! This module provides:
//! - `Deadline`, a monotonic time budget
//! - `poll_until`, the cooperative fixed-interval wait loop
//! - `RunClock`, the wall/monotonic anchor of a selection run
//! - `ProgressMeter`, periodic progress reporting by frame count

use std::time::{Duration, Instant};

/// A monotonic time budget started at construction.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline that expires `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Start a deadline from a budget in (fractional) seconds.
    /// Negative or non-finite values yield an already expired deadline.
    pub fn after_secs(secs: f64) -> Self {
        Self::after(secs_to_duration(secs))
    }

    /// Time spent since the deadline started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// Whether the budget is used up.
    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    /// The total budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Call `check` every `interval` until it yields a value or `deadline`
/// expires.
///
/// The check always runs at least once, so a result that is already present
/// is picked up even with a zero budget. Sleeps never overshoot the
/// deadline by more than one interval.
pub fn poll_until<T>(
    deadline: &Deadline,
    interval: Duration,
    mut check: impl FnMut() -> Option<T>,
) -> Option<T> {
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if deadline.expired() {
            return None;
        }
        std::thread::sleep(interval.min(deadline.remaining()));
    }
}

/// Convert seconds to a `Duration`, clamping negatives and NaN to zero.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Anchor of one selection run.
#[derive(Debug, Clone)]
pub struct RunClock {
    /// The instant the run started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RunClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at run start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Fires once every `every` frames. An interval of zero never fires.
#[derive(Debug)]
pub struct ProgressMeter {
    every: u64,
    last_tick: u64,
}

impl ProgressMeter {
    pub fn new(every: u64) -> Self {
        Self {
            every,
            last_tick: 0,
        }
    }

    /// Check whether `frame_count` reached the next reporting point.
    pub fn should_report(&mut self, frame_count: u64) -> bool {
        if self.every == 0 || frame_count < self.last_tick + self.every {
            return false;
        }
        self.last_tick = frame_count - frame_count % self.every;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);

        let deadline = Deadline::after_secs(60.0);
        assert!(!deadline.expired());
        assert!(deadline.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn test_secs_to_duration_clamps() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(0.25), Duration::from_millis(250));
    }

    #[test]
    fn test_poll_until_checks_once_with_zero_budget() {
        let deadline = Deadline::after(Duration::ZERO);
        let mut calls = 0;
        let found = poll_until(&deadline, Duration::from_millis(5), || {
            calls += 1;
            Some(7)
        });
        assert_eq!(found, Some(7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_poll_until_times_out() {
        let deadline = Deadline::after(Duration::from_millis(30));
        let found: Option<()> = poll_until(&deadline, Duration::from_millis(5), || None);
        assert!(found.is_none());
        assert!(deadline.expired());
    }

    #[test]
    fn test_poll_until_finds_late_value() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let mut calls = 0;
        let found = poll_until(&deadline, Duration::from_millis(1), || {
            calls += 1;
            (calls == 3).then_some("ready")
        });
        assert_eq!(found, Some("ready"));
    }

    #[test]
    fn test_progress_meter() {
        let mut meter = ProgressMeter::new(100);
        assert!(!meter.should_report(1));
        assert!(!meter.should_report(99));
        assert!(meter.should_report(100));
        assert!(!meter.should_report(100));
        assert!(!meter.should_report(150));
        assert!(meter.should_report(200));

        let mut silent = ProgressMeter::new(0);
        assert!(!silent.should_report(1000));
    }
}
