/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Concurrent composition: tick every running child each cycle.
//!
//! "Concurrent" means cooperative interleaving inside one tick, in list
//! order.  A slow child delays its siblings for that tick.

use std::fmt;

use tracing::{debug, warn};

use super::{worst_state, Behavior, Command, State};

/// Drives all of its children every tick and aggregates their outcomes.
///
/// The group ends once every child has ended, with the most severe child
/// outcome (see [`worst_state`]).  With `stop_on_first_done` the group instead
/// ends on the first tick in which any child finishes; siblings still running
/// are then stopped through [`end`](Command::end).
pub struct Parallel<C> {
    name: String,
    commands: Vec<Command<C>>,

    /// Last result recorded for each child, index-aligned with `commands`.
    states: Vec<State>,

    stop_on_first_done: bool,

    /// Maximum of the children's timeouts.
    timeout: f64,
}

impl<C> Parallel<C> {
    pub fn new(name: impl Into<String>, stop_on_first_done: bool) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            states: Vec::new(),
            stop_on_first_done,
            timeout: 0.0,
        }
    }

    /// Add a child; the group timeout becomes the largest child timeout.
    ///
    /// Refused while any child is running: a child added mid-run would never
    /// be started and the group could only end by timing out.
    pub fn add(&mut self, command: Command<C>) -> &mut Self {
        if self.running() > 0 {
            warn!(
                group = %self.name,
                command = %command.name(),
                "add() refused, group is running"
            );
            return self;
        }
        self.timeout = self.timeout.max(command.timeout());
        self.commands.push(command);
        self.states.push(State::NeverStarted);
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, command: Command<C>) -> Self {
        self.add(command);
        self
    }

    /// Drop every child.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.states.clear();
        self.timeout = 0.0;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn stop_on_first_done(&self) -> bool {
        self.stop_on_first_done
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of children whose recorded state is `StillRunning`.
    pub fn running(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == State::StillRunning)
            .count()
    }

    /// Wrap the group in a [`Command`] whose timeout is the children's max.
    pub fn into_command(self) -> Command<C>
    where
        C: 'static,
    {
        let name = self.name.clone();
        let timeout = self.timeout;
        Command::new(name, timeout, self)
    }
}

impl<C> Behavior<C> for Parallel<C> {
    fn on_initialize(&mut self, ctx: &mut C) {
        for (command, state) in self.commands.iter_mut().zip(self.states.iter_mut()) {
            *state = State::StillRunning;
            command.initialize(ctx);
        }
    }

    fn on_execute(&mut self, ctx: &mut C, _elapsed_secs: f64) -> State {
        let mut finished_now = 0usize;
        let mut worst_now = State::NormalEnd;

        for (command, recorded) in self.commands.iter_mut().zip(self.states.iter_mut()) {
            if *recorded != State::StillRunning {
                continue;
            }

            let state = command.execute(ctx);
            *recorded = state;

            if state != State::StillRunning {
                debug!(group = %self.name, command = %command.name(), state = %state, "child finished");
                finished_now += 1;
                worst_now = worst_state(worst_now, state);
                if self.stop_on_first_done {
                    break;
                }
            }
        }

        if self.states.iter().all(|s| s.is_terminal()) {
            return self
                .states
                .iter()
                .fold(State::NormalEnd, |acc, s| worst_state(acc, *s));
        }
        if self.stop_on_first_done && finished_now > 0 {
            return worst_now;
        }
        State::StillRunning
    }

    fn on_end(&mut self, ctx: &mut C, reason: State) {
        for (command, recorded) in self.commands.iter_mut().zip(self.states.iter_mut()) {
            command.end(ctx, reason);
            if *recorded == State::StillRunning {
                *recorded = reason;
            }
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " [{} running of {}]: {{",
            self.running(),
            self.commands.len()
        )?;
        for (command, state) in self.commands.iter().zip(&self.states) {
            if *state == State::StillRunning {
                write!(f, " {}", command.name())?;
            }
        }
        f.write_str(" }")
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

    /// Two children: "fast" ends on tick 1, "slow" on tick 3.
    fn fast_and_slow(log: &Log, stop_on_first_done: bool) -> Command<()> {
        Parallel::new("group", stop_on_first_done)
            .with(scripted(log, "fast", 1, State::NormalEnd, 5.0))
            .with(scripted(log, "slow", 3, State::NormalEnd, 5.0))
            .into_command()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn timeout_is_max_of_children() {
        let log = new_log();
        let group = Parallel::new("g", false)
            .with(scripted(&log, "a", 1, State::NormalEnd, 1.5))
            .with(scripted(&log, "b", 1, State::NormalEnd, 4.0))
            .with(scripted(&log, "c", 1, State::NormalEnd, 0.5));
        assert_eq!(group.timeout(), 4.0);
        assert_eq!(group.into_command().timeout(), 4.0);
    }

    #[test]
    fn clear_drops_children_and_timeout() {
        let log = new_log();
        let mut group = Parallel::new("g", false).with(scripted(&log, "a", 1, State::NormalEnd, 2.0));
        group.clear();
        assert!(group.is_empty());
        assert_eq!(group.timeout(), 0.0);
    }

    #[test]
    fn initialize_starts_every_child() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, false);
        cmd.initialize(&mut ());
        assert_eq!(
            *log.borrow(),
            vec![Call::Init("fast"), Call::Init("slow")]
        );
    }

    #[test]
    fn add_is_refused_while_running() {
        let log = new_log();
        let mut group = Parallel::new("g", false).with(scripted(&log, "a", 1, State::NormalEnd, 1.0));
        group.on_initialize(&mut ());

        group.add(scripted(&log, "late", 1, State::NormalEnd, 9.0));
        assert_eq!(group.len(), 1);
        assert_eq!(group.timeout(), 1.0);
        assert_eq!(group.on_execute(&mut (), 0.0), State::NormalEnd);

        // Once every child has finished the group accepts new children again.
        group.add(scripted(&log, "next", 1, State::NormalEnd, 2.0));
        assert_eq!(group.len(), 2);
    }

    // ── Wait for all ──────────────────────────────────────────────────────────

    #[test]
    fn waits_for_every_child_without_stop_on_first_done() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, false);
        cmd.initialize(&mut ());

        assert_eq!(tick(&mut cmd), State::StillRunning);
        assert_eq!(tick(&mut cmd), State::StillRunning);
        assert_eq!(tick(&mut cmd), State::NormalEnd);

        assert_eq!(
            count(&log, |c| *c == Call::Exec("fast")),
            1,
            "finished children are not ticked again"
        );
        assert_eq!(count(&log, |c| *c == Call::Exec("slow")), 3);
    }

    #[test]
    fn aggregate_is_worst_child_outcome() {
        let log = new_log();
        let mut cmd = Parallel::new("g", false)
            .with(scripted(&log, "late_ok", 2, State::NormalEnd, 5.0))
            .with(scripted(&log, "early_timeout", 1, State::TimedOut, 5.0))
            .into_command();
        cmd.initialize(&mut ());

        assert_eq!(tick(&mut cmd), State::StillRunning);
        assert_eq!(tick(&mut cmd), State::TimedOut);
    }

    #[test]
    fn end_reaches_every_child_exactly_once() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, false);
        cmd.initialize(&mut ());
        let mut result = State::StillRunning;
        while result == State::StillRunning {
            result = tick(&mut cmd);
        }
        cmd.end(&mut (), result);

        assert_eq!(count(&log, |c| *c == Call::End("fast", State::NormalEnd)), 1);
        assert_eq!(count(&log, |c| *c == Call::End("slow", State::NormalEnd)), 1);
    }

    #[test]
    fn empty_group_ends_normally() {
        let mut group: Parallel<()> = Parallel::new("empty", false);
        group.on_initialize(&mut ());
        assert_eq!(group.on_execute(&mut (), 0.0), State::NormalEnd);
    }

    // ── Stop on first done ────────────────────────────────────────────────────

    #[test]
    fn stop_on_first_done_ends_group_on_first_finish() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, true);
        cmd.initialize(&mut ());

        let result = tick(&mut cmd);
        assert_eq!(result, State::NormalEnd);
        cmd.end(&mut (), result);

        assert_eq!(
            count(&log, |c| *c == Call::End("slow", State::NormalEnd)),
            1,
            "abandoned sibling must be ended with the group's reason"
        );
        assert_eq!(
            count(&log, |c| *c == Call::Exec("slow")),
            0,
            "scanning stops at the first finished child"
        );
    }

    #[test]
    fn stop_on_first_done_surfaces_failure() {
        let log = new_log();
        let mut cmd = Parallel::new("g", true)
            .with(scripted(&log, "drive", 10, State::NormalEnd, 5.0))
            .with(scripted(&log, "watchdog", 2, State::Interrupted, 5.0))
            .into_command();
        cmd.initialize(&mut ());

        assert_eq!(tick(&mut cmd), State::StillRunning);
        let result = tick(&mut cmd);
        assert_eq!(result, State::Interrupted);
        cmd.end(&mut (), result);
        assert_eq!(count(&log, |c| *c == Call::End("drive", State::Interrupted)), 1);
    }

    #[test]
    fn external_interrupt_ends_running_children() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, false);
        cmd.initialize(&mut ());
        tick(&mut cmd);

        cmd.end(&mut (), State::StillRunning);

        assert_eq!(cmd.state(), State::Interrupted);
        assert_eq!(count(&log, |c| *c == Call::End("slow", State::Interrupted)), 1);
        assert_eq!(
            count(&log, |c| *c == Call::End("fast", State::Interrupted)),
            1,
            "every child is ended with the group's reason"
        );
    }

    #[test]
    fn finished_children_are_ended_with_the_group_reason() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, false);
        cmd.initialize(&mut ());
        tick(&mut cmd);

        cmd.end(&mut (), State::TimedOut);

        let ends: Vec<Call> = log
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::End(..)))
            .cloned()
            .collect();
        assert_eq!(
            ends,
            vec![
                Call::End("fast", State::TimedOut),
                Call::End("slow", State::TimedOut)
            ]
        );
    }

    // ── Display ───────────────────────────────────────────────────────────────

    #[test]
    fn display_lists_running_children() {
        let log = new_log();
        let mut cmd = fast_and_slow(&log, false);
        cmd.initialize(&mut ());
        tick(&mut cmd);
        let text = cmd.to_string();
        assert!(text.contains("[1 running of 2]: { slow }"), "{text}");
    }
}
