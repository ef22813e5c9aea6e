/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Top-level mission behaviour and the course routes.

use std::fmt;

use tracing::{error, info};

use super::{DrivePowerTime, DriveStraight, DriveToTurn, MakeTurn, Rover};
use crate::command::{Behavior, Command, Parallel, Sequence, State};
use crate::config::{DriveConfig, Route};

/// Root of a run.
///
/// Owns the rover lifecycle around a group of commands that stops as soon as
/// any of them finishes: the rover is reset before the first tick, its sensors
/// are refreshed at the top of every tick, and it is disabled when the mission
/// ends.  A crashed rover interrupts the whole tree.
pub struct Mission {
    group: Parallel<Rover>,
}

impl Mission {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            group: Parallel::new(name, true),
        }
    }

    pub fn add(&mut self, command: Command<Rover>) -> &mut Self {
        self.group.add(command);
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, command: Command<Rover>) -> Self {
        self.add(command);
        self
    }

    pub fn len(&self) -> usize {
        self.group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty()
    }

    /// Wrap the mission in a [`Command`] limited by its longest child.
    pub fn into_command(self) -> Command<Rover> {
        let name = self.group.name().to_owned();
        let timeout = self.group.timeout();
        Command::new(name, timeout, self)
    }
}

impl Behavior<Rover> for Mission {
    fn on_initialize(&mut self, rover: &mut Rover) {
        info!(mission = %self.group.name(), "mission starting");
        rover.reset();
        self.group.on_initialize(rover);
    }

    fn on_execute(&mut self, rover: &mut Rover, elapsed_secs: f64) -> State {
        rover.read_sensors();
        if rover.is_crashed() {
            error!(mission = %self.group.name(), "rover crashed, interrupting mission");
            rover.coast();
            return State::Interrupted;
        }
        self.group.on_execute(rover, elapsed_secs)
    }

    fn on_end(&mut self, rover: &mut Rover, reason: State) {
        self.group.on_end(rover, reason);
        rover.disable();
        info!(mission = %self.group.name(), state = %reason, "mission ended: {rover}");
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.group.describe(f)
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

/// Build the mission command for one way around the course.
pub fn build_mission(route: Route, tuning: &DriveConfig) -> Command<Rover> {
    let drive = match route {
        Route::LongWay => long_way(tuning),
        Route::ShortWay => short_way(tuning),
    };
    info!(%route, steps = drive.len(), timeout_secs = drive.timeout(), "route built");
    Mission::new("Mission").with(drive.into_command()).into_command()
}

/// Pause with the motors stopped.
fn pause(secs: f64) -> Command<Rover> {
    DrivePowerTime::new(0.0, 0.0, secs).into_command()
}

/// All four sides, starting halfway along a short side.  Each side ends when
/// the corner stanchion comes into view.
fn long_way(tuning: &DriveConfig) -> Sequence<Rover> {
    let side = |secs: f64| DriveToTurn::new(tuning.power).into_command(secs);
    let corner = || MakeTurn::new(90.0).into_command();
    let short = tuning.short_side_secs;
    let long = tuning.long_side_secs;

    Sequence::new("Drive")
        .then(pause(tuning.settle_secs))
        .then(side(short / 2.0))
        .then(pause(tuning.stop_secs))
        .then(corner())
        .then(side(long))
        .then(pause(tuning.stop_secs))
        .then(corner())
        .then(side(short))
        .then(pause(tuning.stop_secs))
        .then(corner())
        .then(side(long))
        .then(pause(tuning.stop_secs))
        .then(corner())
        .then(side(short / 2.0 + short / 10.0))
        .then(DrivePowerTime::stop())
}

/// One gyro-held leg guided by the stanchions, then a single corner.
fn short_way(tuning: &DriveConfig) -> Sequence<Rover> {
    Sequence::new("Drive")
        .then(pause(tuning.settle_secs))
        .then(DriveStraight::new(0.0, 0.0, true, tuning).into_command())
        .then(pause(tuning.stop_secs))
        .then(MakeTurn::new(90.0).into_command())
        .then(DrivePowerTime::stop())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
