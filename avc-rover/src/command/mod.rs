/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cooperative command framework.
//!
//! A [`Command`] is a named unit of work with a timeout and a lifecycle:
//!
//! ```text
//!                initialize()              end(reason)
//! NeverStarted ──────────────► StillRunning ──────────► NormalEnd | Interrupted | TimedOut
//!                                  │  ▲
//!                                  └──┘ execute() → StillRunning
//! ```
//!
//! The per-behaviour logic lives behind the [`Behavior`] trait.  `Command`
//! owns the timer and the state machine, so timeout enforcement and the
//! `StillRunning → Interrupted` remap cannot be bypassed by a behaviour.
//!
//! Every hook receives the shared context `C` (the vehicle for drive
//! behaviours) by `&mut`, so behaviours never hold references into their
//! owner.  Composites ([`Sequence`], [`Parallel`]) are behaviours that own
//! child commands.

pub mod parallel;
pub mod sequence;

pub use parallel::Parallel;
pub use sequence::Sequence;

use std::fmt;

use tracing::warn;

use crate::timer::Timer;

/// Timeout used by [`Command::with_default_timeout`], in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 1.0;

// ── State ─────────────────────────────────────────────────────────────────────

/// Run state of a command, also used as the result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Ran as expected without problems.
    NormalEnd,
    /// Still needs more ticks.
    StillRunning,
    /// `initialize()` has never been called.
    NeverStarted,
    /// Stopped by some external cause while running.
    Interrupted,
    /// Failed to finish within its timeout.
    TimedOut,
}

impl State {
    /// `true` for the three states a command can end in.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            State::NormalEnd | State::Interrupted | State::TimedOut
        )
    }

    /// Ranking used by [`worst_state`].  Non-terminal states rank lowest.
    fn severity(self) -> u8 {
        match self {
            State::StillRunning | State::NeverStarted => 0,
            State::NormalEnd => 1,
            State::Interrupted => 2,
            State::TimedOut => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::NormalEnd => "completed-ok",
            State::StillRunning => "still-running",
            State::NeverStarted => "never-started",
            State::Interrupted => "was-interrupted",
            State::TimedOut => "timed-out",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold two terminal outcomes into the more severe one.
///
/// Severity: `NormalEnd < Interrupted < TimedOut`.
pub fn worst_state(a: State, b: State) -> State {
    debug_assert!(
        a.is_terminal() && b.is_terminal(),
        "worst_state called with non-terminal input ({a:?}, {b:?})"
    );
    if b.severity() > a.severity() {
        b
    } else {
        a
    }
}

// ── Behavior ──────────────────────────────────────────────────────────────────

/// The three lifecycle hooks supplied by a concrete command.
///
/// All hooks have defaults, so a behaviour only implements what it needs.  The
/// default `on_execute` finishes immediately with [`State::NormalEnd`].
pub trait Behavior<C> {
    /// Called once per run, right after the owning command starts its timer.
    fn on_initialize(&mut self, _ctx: &mut C) {}

    /// Called every tick while the command is running and not timed out.
    ///
    /// `elapsed_secs` is the time since the owning command was initialised.
    fn on_execute(&mut self, _ctx: &mut C, _elapsed_secs: f64) -> State {
        State::NormalEnd
    }

    /// Called once when the command leaves `StillRunning`, with the resolved
    /// (never `StillRunning`) reason.
    fn on_end(&mut self, _ctx: &mut C, _reason: State) {}

    /// Extra diagnostic text appended to the owning command's `Display`.
    fn describe(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// A named, time-limited unit of work driven through
/// `initialize → execute* → end`.
pub struct Command<C> {
    name: String,

    /// Maximum number of seconds `execute()` may be called after
    /// `initialize()` before the command is reported as timed out.
    timeout: f64,

    state: State,

    /// Measures the current (or last) run.
    timer: Timer,

    behavior: Box<dyn Behavior<C>>,
}

impl<C> Command<C> {
    /// Wrap `behavior` in a new command that has never been started.
    pub fn new<B>(name: impl Into<String>, timeout: f64, behavior: B) -> Self
    where
        B: Behavior<C> + 'static,
    {
        let mut timer = Timer::new();
        timer.pause();
        Self {
            name: name.into(),
            timeout,
            state: State::NeverStarted,
            timer,
            behavior: Box::new(behavior),
        }
    }

    /// Like [`new`](Self::new) with the default one second timeout.
    pub fn with_default_timeout<B>(name: impl Into<String>, behavior: B) -> Self
    where
        B: Behavior<C> + 'static,
    {
        Self::new(name, DEFAULT_TIMEOUT_SECS, behavior)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn set_timeout(&mut self, secs: f64) {
        self.timeout = secs;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Seconds since `initialize()`, or the total time of the last run.
    pub fn elapsed_secs(&self) -> f64 {
        self.timer.secs_elapsed()
    }

    /// Enter `StillRunning`, restart the timer and run the setup hook.
    pub fn initialize(&mut self, ctx: &mut C) {
        self.state = State::StillRunning;
        self.timer.start();
        self.behavior.on_initialize(ctx);
    }

    /// Run one tick.
    ///
    /// The timeout check comes first and short-circuits the behaviour.
    /// Calling this on a command that is not running is refused: the current
    /// state is returned and no hook runs.
    pub fn execute(&mut self, ctx: &mut C) -> State {
        if self.state != State::StillRunning {
            warn!(
                command = %self.name,
                state = %self.state,
                "execute() called on a command that is not running"
            );
            return self.state;
        }

        let elapsed = self.timer.secs_elapsed();
        if elapsed > self.timeout {
            return State::TimedOut;
        }
        match self.behavior.on_execute(ctx, elapsed) {
            State::NeverStarted => {
                warn!(
                    command = %self.name,
                    "execute hook reported never-started, treating as interrupted"
                );
                State::Interrupted
            }
            state => state,
        }
    }

    /// Finish the current run.
    ///
    /// A non-terminal `reason` means the command was stopped from outside
    /// and is recorded as [`State::Interrupted`].  Only the first `end()` after
    /// an `initialize()` has any effect.
    pub fn end(&mut self, ctx: &mut C, reason: State) {
        if self.state != State::StillRunning {
            warn!(
                command = %self.name,
                state = %self.state,
                "end() ignored, command is not running"
            );
            return;
        }

        self.timer.pause();
        let reason = if reason.is_terminal() {
            reason
        } else {
            State::Interrupted
        };
        self.state = reason;
        self.behavior.on_end(ctx, reason);
    }
}

impl<C> fmt::Display for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(state={}, secsElapsed={:.3})",
            self.name,
            self.state,
            self.timer.secs_elapsed()
        )?;
        self.behavior.describe(f)
    }
}

impl<C> fmt::Debug for Command<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

// ── Test support ──────────────────────────────────────────────────────────────


// ── Tests ─────────────────────────────────────────────────────────────────────
