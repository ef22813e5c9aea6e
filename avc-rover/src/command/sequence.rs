/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Ordered composition: run children one at a time, fail fast.

use std::fmt;

use tracing::info;

use super::{Behavior, Command, State};

/// Runs its children strictly in order, advancing only when the current child
/// ends with [`State::NormalEnd`].
///
/// Any other terminal result aborts the sequence and becomes the sequence's
/// own result; the remaining children are never initialised.  Several
/// zero-duration children may complete within a single tick.
pub struct Sequence<C> {
    name: String,
    commands: Vec<Command<C>>,

    /// Index of the active child; `commands.len()` once exhausted.
    current: usize,

    /// Whether the active child still needs its `initialize()` call.
    needs_initialize: bool,

    /// Sum of the children's timeouts.
    timeout: f64,
}

impl<C> Sequence<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            current: 0,
            needs_initialize: true,
            timeout: 0.0,
        }
    }

    /// Append a child; the sequence timeout grows by the child's timeout.
    pub fn add(&mut self, command: Command<C>) -> &mut Self {
        self.timeout += command.timeout();
        self.commands.push(command);
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn then(mut self, command: Command<C>) -> Self {
        self.add(command);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Wrap the sequence in a [`Command`] whose timeout is the children's sum.
    pub fn into_command(self) -> Command<C>
    where
        C: 'static,
    {
        let name = self.name.clone();
        let timeout = self.timeout;
        Command::new(name, timeout, self)
    }
}

impl<C> Behavior<C> for Sequence<C> {
    fn on_initialize(&mut self, _ctx: &mut C) {
        self.current = 0;
        self.needs_initialize = true;
    }

    fn on_execute(&mut self, ctx: &mut C, _elapsed_secs: f64) -> State {
        let mut state = State::NormalEnd;
        let total = self.commands.len();

        while let Some(command) = self.commands.get_mut(self.current) {
            if self.needs_initialize {
                self.needs_initialize = false;
                command.initialize(ctx);
                info!(
                    sequence = %self.name,
                    step = self.current + 1,
                    of = total,
                    command = %command.name(),
                    "sequence step started"
                );
            }

            state = command.execute(ctx);
            if state == State::StillRunning {
                return state;
            }

            command.end(ctx, state);
            info!(
                sequence = %self.name,
                step = self.current + 1,
                of = total,
                "sequence step ended: {command}"
            );

            if state != State::NormalEnd {
                return state;
            }

            self.current += 1;
            self.needs_initialize = true;
        }

        state
    }

    fn on_end(&mut self, ctx: &mut C, reason: State) {
        // A child can only still be running here when the sequence itself was
        // stopped from outside (timeout or parent interruption).
        if let Some(command) = self.commands.get_mut(self.current) {
            if command.state() == State::StillRunning {
                command.end(ctx, reason);
            }
        }
        self.current = self.commands.len();
        self.needs_initialize = true;
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " [{} of {}]", self.current, self.commands.len())?;
        if let Some(command) = self.commands.get(self.current) {
            write!(f, " = {command}")?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn tick(cmd: &mut Command<()>) -> State {
        cmd.execute(&mut ())
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn timeout_is_sum_of_children() {
        let log = new_log();
        let seq = Sequence::new("s")
            .then(scripted(&log, "a", 1, State::NormalEnd, 1.5))
            .then(scripted(&log, "b", 1, State::NormalEnd, 2.0))
            .then(scripted(&log, "c", 1, State::NormalEnd, 0.5));
        assert_eq!(seq.timeout(), 4.0);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.into_command().timeout(), 4.0);
    }

    #[test]
    fn initialize_does_not_touch_children() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "a", 1, State::NormalEnd, 1.0))
            .into_command();
        cmd.initialize(&mut ());
        assert!(log.borrow().is_empty());
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_sequence_ends_normally_at_once() {
        let mut seq: Sequence<()> = Sequence::new("empty");
        seq.on_initialize(&mut ());
        assert_eq!(seq.on_execute(&mut (), 0.0), State::NormalEnd);

        // Wrapped, the derived timeout is 0 and would fire before the child
        // list is looked at.
        let mut cmd: Command<()> = seq.into_command();
        assert_eq!(cmd.timeout(), 0.0);
        cmd.set_timeout(1.0);
        cmd.initialize(&mut ());
        assert_eq!(tick(&mut cmd), State::NormalEnd);
    }

    #[test]
    fn zero_duration_children_complete_in_one_tick() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "a", 1, State::NormalEnd, 1.0))
            .then(scripted(&log, "b", 1, State::NormalEnd, 1.0))
            .then(scripted(&log, "c", 2, State::NormalEnd, 1.0))
            .into_command();
        cmd.initialize(&mut ());

        assert_eq!(tick(&mut cmd), State::StillRunning);
        assert_eq!(
            *log.borrow(),
            vec![
                Call::Init("a"),
                Call::Exec("a"),
                Call::End("a", State::NormalEnd),
                Call::Init("b"),
                Call::Exec("b"),
                Call::End("b", State::NormalEnd),
                Call::Init("c"),
                Call::Exec("c"),
            ]
        );

        assert_eq!(tick(&mut cmd), State::NormalEnd);
        assert_eq!(log.borrow().last(), Some(&Call::End("c", State::NormalEnd)));
    }

    #[test]
    fn child_failure_aborts_remaining_children() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "one", 1, State::NormalEnd, 1.0))
            .then(scripted(&log, "two", 2, State::TimedOut, 1.0))
            .then(scripted(&log, "three", 1, State::NormalEnd, 1.0))
            .into_command();
        cmd.initialize(&mut ());

        assert_eq!(tick(&mut cmd), State::StillRunning);
        let result = tick(&mut cmd);
        assert_eq!(result, State::TimedOut);
        cmd.end(&mut (), result);

        assert_eq!(cmd.state(), State::TimedOut);
        assert_eq!(count(&log, |c| *c == Call::Init("three")), 0);
        assert_eq!(count(&log, |c| *c == Call::End("two", State::TimedOut)), 1);
    }

    #[test]
    fn interrupted_child_propagates_interrupted() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "a", 1, State::Interrupted, 1.0))
            .then(scripted(&log, "b", 1, State::NormalEnd, 1.0))
            .into_command();
        cmd.initialize(&mut ());
        assert_eq!(tick(&mut cmd), State::Interrupted);
        assert_eq!(count(&log, |c| *c == Call::Init("b")), 0);
    }

    // ── External end ──────────────────────────────────────────────────────────

    #[test]
    fn external_end_stops_running_child_once() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "a", 10, State::NormalEnd, 1.0))
            .then(scripted(&log, "b", 1, State::NormalEnd, 1.0))
            .into_command();
        cmd.initialize(&mut ());
        assert_eq!(tick(&mut cmd), State::StillRunning);

        cmd.end(&mut (), State::StillRunning);

        assert_eq!(cmd.state(), State::Interrupted);
        assert_eq!(
            count(&log, |c| *c == Call::End("a", State::Interrupted)),
            1,
            "mid-flight child must be ended with the resolved reason"
        );
        assert_eq!(count(&log, |c| *c == Call::Init("b")), 0);
    }

    #[test]
    fn end_after_failure_does_not_end_child_twice() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "a", 1, State::TimedOut, 1.0))
            .into_command();
        cmd.initialize(&mut ());
        let result = tick(&mut cmd);
        cmd.end(&mut (), result);
        assert_eq!(count(&log, |c| matches!(c, Call::End("a", _))), 1);
    }

    #[test]
    fn sequence_can_be_rerun() {
        let log = new_log();
        let mut cmd = Sequence::new("s")
            .then(scripted(&log, "a", 1, State::NormalEnd, 1.0))
            .into_command();
        for _ in 0..2 {
            cmd.initialize(&mut ());
            let s = tick(&mut cmd);
            assert_eq!(s, State::NormalEnd);
            cmd.end(&mut (), s);
        }
        assert_eq!(count(&log, |c| *c == Call::Init("a")), 2);
    }

    // ── Display ───────────────────────────────────────────────────────────────

    #[test]
    fn display_shows_progress_and_current_child() {
        let log = new_log();
        let mut cmd = Sequence::new("Drive")
            .then(scripted(&log, "a", 1, State::NormalEnd, 1.0))
            .then(scripted(&log, "b", 5, State::NormalEnd, 1.0))
            .into_command();
        cmd.initialize(&mut ());
        tick(&mut cmd);

        let text = cmd.to_string();
        assert!(text.contains("[1 of 2] = b(state=still-running"), "{text}");
    }
}
