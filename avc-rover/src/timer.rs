/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Monotonic interval timer and tick pacing.
//!
//! [`Timer`] wraps [`std::time::Instant`], which never goes backwards and is
//! immune to wall-clock adjustments.  Two marks are kept:
//!
//! ```text
//!   start ──────────────── end        (paused:  elapsed = end - start)
//!   start ─────────────────────► now  (running: elapsed = now - start)
//! ```
//!
//! [`Timer::sleep_until_next_period`] is what keeps the command scheduler on a
//! fixed tick rate: the period grid is anchored at `start`, so jitter in the
//! caller's own work never accumulates into drift.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic stopwatch with start / pause / unpause semantics.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    /// Instant the timer was last (re)started.
    start: Instant,

    /// Instant the timer was last paused.  Equal to `start` after `start()`.
    end: Instant,

    running: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a timer and "press the start button".
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            end: now,
            running: true,
        }
    }

    /// Reset both marks to now and enter the running state.
    pub fn start(&mut self) {
        self.start = Instant::now();
        self.end = self.start;
        self.running = true;
    }

    /// Record the end mark and leave the running state.
    pub fn pause(&mut self) {
        self.end = Instant::now();
        self.running = false;
    }

    /// Re-enter the running state without touching the start mark.
    ///
    /// Elapsed time keeps accumulating from the original start, including the
    /// time spent paused.
    pub fn unpause(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Elapsed time: `now - start` while running, `end - start` once paused.
    pub fn elapsed(&self) -> Duration {
        if self.running {
            self.start.elapsed()
        } else {
            self.end.saturating_duration_since(self.start)
        }
    }

    /// [`elapsed`](Self::elapsed) as fractional seconds.
    pub fn secs_elapsed(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Sleep until the next boundary of a repeating `period` window anchored
    /// at the start mark.
    ///
    /// Returns the part of the requested sleep that was not satisfied (zero
    /// in the normal case).  A zero `period` returns immediately.
    pub fn sleep_until_next_period(&self, period: Duration) -> Duration {
        let period_ns = period.as_nanos();
        if period_ns == 0 {
            return Duration::ZERO;
        }

        let into_period = self.start.elapsed().as_nanos() % period_ns;
        // `period_ns - into_period` is in (0, period_ns], which fits a u64
        // whenever `period` itself came from a u64 nanosecond count.
        let remaining = u64::try_from(period_ns - into_period).unwrap_or(u64::MAX);

        Self::sleep_duration(Duration::from_nanos(remaining))
    }

    /// Sleep for `secs` seconds (fractions allowed).
    ///
    /// Returns the number of seconds NOT slept.  Negative and non-finite
    /// requests sleep nothing.
    pub fn sleep(secs: f64) -> f64 {
        if !secs.is_finite() || secs <= 0.0 {
            return 0.0;
        }
        Self::sleep_duration(Duration::from_secs_f64(secs)).as_secs_f64()
    }

    /// Sleep for `wanted` and return the unsatisfied remainder.
    pub fn sleep_duration(wanted: Duration) -> Duration {
        if wanted.is_zero() {
            return Duration::ZERO;
        }
        let before = Instant::now();
        thread::sleep(wanted);
        wanted.saturating_sub(before.elapsed())
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timer(running={}, secsElapsed={:.3})",
            self.running,
            self.secs_elapsed()
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
