//! Fixed-rate "run to completion" driver.
//!
//! [`Scheduler`] is the only place where a top-level command's full lifecycle
//! is driven end to end:
//!
//! ```text
//! initialize() ─► execute() ─► sleep to next tick ─► execute() … ─► end(result)
//! ```
//!
//! Composites replicate the same discipline for their own children.  Ticks are
//! paced with [`Timer::sleep_until_next_period`], so the schedule is anchored
//! to the start of the run and does not drift with per-tick work.
//!
//! # Example
//! ```rust
//! use avc_rover::command::{Behavior, Command, State};
//! use avc_rover::scheduler::Scheduler;
//!
//! struct CountDown(u32);
//!
//! impl Behavior<()> for CountDown {
//!     fn on_execute(&mut self, _ctx: &mut (), _elapsed: f64) -> State {
//!         self.0 -= 1;
//!         if self.0 == 0 { State::NormalEnd } else { State::StillRunning }
//!     }
//! }
//!
//! let mut cmd = Command::new("count", 5.0, CountDown(3));
//! let report = Scheduler::new(200).unwrap().run(&mut cmd, &mut ());
//! assert_eq!(report.state, State::NormalEnd);
//! assert_eq!(report.ticks, 3);
//! ```

pub mod error;

pub use error::SchedulerError;

use std::time::Duration;

use tracing::{debug, info};

use crate::command::{Command, State};
use crate::timer::Timer;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default tick rate of the control loop.
pub const DEFAULT_RATE_HZ: u32 = 20;

const NANOS_PER_SEC: u64 = 1_000_000_000;

// ── RunReport ─────────────────────────────────────────────────────────────────

/// Summary of one completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Final state of the top-level command (always terminal).
    pub state: State,

    /// Number of `execute()` calls made.
    pub ticks: u64,

    /// Wall time from the scheduler start to `end()`, in seconds.
    pub elapsed_secs: f64,
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Drives a command at a fixed tick rate until it produces a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    rate_hz: u32,
    period: Duration,
}

impl Scheduler {
    /// Create a scheduler ticking `rate_hz` times a second.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidRate`] when `rate_hz` is zero.
    pub fn new(rate_hz: u32) -> Result<Self, SchedulerError> {
        if rate_hz == 0 {
            return Err(SchedulerError::InvalidRate(rate_hz));
        }
        Ok(Self {
            rate_hz,
            period: Duration::from_nanos(NANOS_PER_SEC / u64::from(rate_hz)),
        })
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Time between two ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run `command` to completion: `initialize` once, `execute` every tick
    /// until a terminal state, then `end` exactly once with that state.
    pub fn run<C>(&self, command: &mut Command<C>, ctx: &mut C) -> RunReport {
        let pacer = Timer::new();

        info!(
            command = %command.name(),
            rate_hz = self.rate_hz,
            timeout_secs = command.timeout(),
            "run started"
        );
        command.initialize(ctx);

        let mut ticks = 0u64;
        let outcome = loop {
            ticks += 1;
            let state = command.execute(ctx);
            if state != State::StillRunning {
                break state;
            }
            let missed = pacer.sleep_until_next_period(self.period);
            if !missed.is_zero() {
                debug!(?missed, "tick sleep cut short");
            }
        };
        command.end(ctx, outcome);

        let report = RunReport {
            state: command.state(),
            ticks,
            elapsed_secs: pacer.secs_elapsed(),
        };
        info!(
            command = %command.name(),
            state = %report.state,
            ticks = report.ticks,
            elapsed_secs = report.elapsed_secs,
            "run finished"
        );
        report
    }
}

/// Convenience wrapper: run `command` at `rate_hz` and return its final state.
pub fn run_to_completion<C>(
    command: &mut Command<C>,
    ctx: &mut C,
    rate_hz: u32,
) -> Result<State, SchedulerError> {
    Ok(Scheduler::new(rate_hz)?.run(command, ctx).state)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::*;
    use crate::command::{Parallel, Sequence};

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(Scheduler::new(0).unwrap_err(), SchedulerError::InvalidRate(0));
    }

    #[test]
    fn period_matches_rate() {
        let s = Scheduler::new(DEFAULT_RATE_HZ).unwrap();
        assert_eq!(s.period(), Duration::from_millis(50));
        assert_eq!(s.rate_hz(), 20);
    }

    #[test]
    fn run_to_completion_rejects_zero_rate_before_touching_command() {
        let log = new_log();
        let mut cmd = scripted(&log, "a", 1, State::NormalEnd, 1.0);
        assert!(run_to_completion(&mut cmd, &mut (), 0).is_err());
        assert!(log.borrow().is_empty());
        assert_eq!(cmd.state(), State::NeverStarted);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    #[test]
    fn drives_full_lifecycle_once() {
        let log = new_log();
        let mut cmd = scripted(&log, "a", 3, State::NormalEnd, 5.0);
        let report = Scheduler::new(500).unwrap().run(&mut cmd, &mut ());

        assert_eq!(report.state, State::NormalEnd);
        assert_eq!(report.ticks, 3);
        assert_eq!(
            *log.borrow(),
            vec![
                Call::Init("a"),
                Call::Exec("a"),
                Call::Exec("a"),
                Call::Exec("a"),
                Call::End("a", State::NormalEnd),
            ]
        );
    }

    #[test]
    fn ticks_are_paced_by_rate() {
        let log = new_log();
        let mut cmd = scripted(&log, "a", 4, State::NormalEnd, 5.0);
        let report = Scheduler::new(50).unwrap().run(&mut cmd, &mut ());
        // Three sleeps of one 20 ms period each between four ticks.
        assert!(report.elapsed_secs >= 0.06, "{report:?}");
    }

    #[test]
    fn timeout_ends_run_with_timed_out() {
        let log = new_log();
        let mut cmd = scripted(&log, "stuck", u32::MAX, State::NormalEnd, 0.05);
        let state = run_to_completion(&mut cmd, &mut (), 200).unwrap();

        assert_eq!(state, State::TimedOut);
        assert_eq!(cmd.state(), State::TimedOut);
        assert_eq!(count(&log, |c| *c == Call::End("stuck", State::TimedOut)), 1);
    }

    #[test]
    fn nested_tree_ends_every_started_command_once() {
        let log = new_log();
        let drive = Sequence::new("drive")
            .then(scripted(&log, "a", 2, State::NormalEnd, 1.0))
            .then(scripted(&log, "b", 1, State::NormalEnd, 1.0))
            .then(scripted(&log, "c", 50, State::NormalEnd, 1.0))
            .into_command();
        let mut root = Parallel::new("root", true)
            .with(drive)
            .with(scripted(&log, "watch", 4, State::Interrupted, 5.0))
            .into_command();

        let state = run_to_completion(&mut root, &mut (), 500).unwrap();
        assert_eq!(state, State::Interrupted);

        for name in ["a", "b", "c", "watch"] {
            let inits = count(&log, |c| *c == Call::Init(name));
            let ends = count(&log, |c| matches!(c, Call::End(n, _) if *n == name));
            assert_eq!(inits, ends, "{name}: every initialize needs one end");
        }
        assert_eq!(count(&log, |c| *c == Call::End("c", State::Interrupted)), 1);
    }
}
