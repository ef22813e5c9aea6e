/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Closed-loop drive commands.
//!
//! Every command reads the sensor snapshot that [`Mission`](super::Mission)
//! refreshes at the top of each tick and writes motor powers through the
//! [`Rover`].  Headings follow the gyro convention: positive turns are
//! clockwise (right-hand).

use std::fmt;

use tracing::{debug, info};

use super::{angle_diff, Rover, DEFAULT_SEEK_STEP};
use crate::command::{Behavior, Command, State};
use crate::config::DriveConfig;
use crate::hardware::Found;
use crate::timer::Timer;

/// Time limit of a turn: one second plus one second per 25 degrees.
fn turn_timeout(degrees: f32) -> f64 {
    1.0 + f64::from(degrees.abs()) / 25.0
}

// ── DrivePowerTime ────────────────────────────────────────────────────────────

/// Hold fixed powers for a fixed time.
#[derive(Debug, Clone)]
pub struct DrivePowerTime {
    left: f32,
    right: f32,
    run_secs: f64,
}

impl DrivePowerTime {
    pub fn new(left: f32, right: f32, run_secs: f64) -> Self {
        Self {
            left,
            right,
            run_secs,
        }
    }

    /// The command gets one second of slack over its run time.
    pub fn into_command(self) -> Command<Rover> {
        let timeout = self.run_secs + 1.0;
        Command::new("DrivePowerTime", timeout, self)
    }

    /// Bring the rover to a stop (zero powers, zero run time).
    pub fn stop() -> Command<Rover> {
        Self::new(0.0, 0.0, 0.0).into_command()
    }
}

impl Behavior<Rover> for DrivePowerTime {
    fn on_execute(&mut self, rover: &mut Rover, elapsed_secs: f64) -> State {
        if elapsed_secs >= self.run_secs {
            return State::NormalEnd;
        }
        rover.seek_drive(self.left, self.right, DEFAULT_SEEK_STEP);
        State::StillRunning
    }

    fn on_end(&mut self, rover: &mut Rover, reason: State) {
        if reason == State::NormalEnd && self.left == 0.0 && self.right == 0.0 {
            rover.drive(0.0, 0.0);
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " [left={}, right={}, secs={}]", self.left, self.right, self.run_secs)
    }
}

// ── DriveToTurn ───────────────────────────────────────────────────────────────

/// Drive along the current heading until a corner stanchion shows up.
///
/// Drift of more than a degree is steered out by shifting power between the
/// sides in proportion to the drift.  Reaching the corner advances the rover's
/// waypoint.
#[derive(Debug, Clone)]
pub struct DriveToTurn {
    power: f32,
    initial_heading: f32,
}

impl DriveToTurn {
    /// Degrees of drift tolerated before correcting.
    pub const DEADBAND_DEG: f32 = 1.0;

    pub fn new(power: f32) -> Self {
        Self {
            power,
            initial_heading: 0.0,
        }
    }

    pub fn into_command(self, timeout_secs: f64) -> Command<Rover> {
        Command::new("DriveToTurn", timeout_secs, self)
    }

    /// Power moved from the left to the right side for a drift of `turned`
    /// degrees.
    pub fn correction(turned: f32) -> f32 {
        let magnitude = turned.abs();
        if magnitude <= Self::DEADBAND_DEG {
            return 0.0;
        }
        let correct = magnitude / 180.0 + 0.005;
        if turned > 0.0 {
            correct
        } else {
            -correct
        }
    }
}

impl Behavior<Rover> for DriveToTurn {
    fn on_initialize(&mut self, rover: &mut Rover) {
        self.initial_heading = rover.heading();
        info!(heading = self.initial_heading, "DriveToTurn started: {rover}");
    }

    fn on_execute(&mut self, rover: &mut Rover, _elapsed_secs: f64) -> State {
        let turned = rover.relative_heading(self.initial_heading);
        let correct = Self::correction(turned);
        if correct != 0.0 {
            debug!(turned, correct, "off course");
        }

        let left = Rover::range_check_power(self.power - correct);
        let right = Rover::range_check_power(self.power + correct);
        rover.seek_drive(left, right, DEFAULT_SEEK_STEP);

        debug!(left, right, "DriveToTurn: {rover}");
        if rover.at_corner() {
            State::NormalEnd
        } else {
            State::StillRunning
        }
    }

    fn on_end(&mut self, rover: &mut Rover, reason: State) {
        info!(state = %reason, "DriveToTurn ended: {rover}");
        rover.next_waypoint();
    }
}

// ── MakeTurn ──────────────────────────────────────────────────────────────────

/// Spin in place by a relative angle using a PD loop.
///
/// Keep turns within about ±150°; larger requests tend to overshoot wildly
/// because the relative heading wraps at ±180°.
#[derive(Debug, Clone)]
pub struct MakeTurn {
    /// Signed degrees to turn.
    turn: f32,
    initial_heading: f32,
    last_err: f32,
    in_range: u32,
}

impl MakeTurn {
    pub const P: f32 = 0.1 * 10.0 / 360.0;
    pub const D: f32 = 0.075 * 10.0 / 360.0;

    /// Steering magnitude cap before the minimum power shift.
    pub const MAX_STEER: f32 = 0.15;

    /// Power needed to get the rover turning at all.
    pub const MIN_STEER: f32 = 0.15;

    /// Turn is done once this close for `SETTLE_TICKS` ticks in a row.
    pub const TOLERANCE_DEG: f32 = 3.0;
    pub const SETTLE_TICKS: u32 = 3;

    pub fn new(turn: f32) -> Self {
        Self {
            turn,
            initial_heading: 0.0,
            last_err: turn,
            in_range: 0,
        }
    }

    pub fn into_command(self) -> Command<Rover> {
        let timeout = turn_timeout(self.turn);
        Command::new("MakeTurn", timeout, self)
    }

    /// Left-side power for angle error `err` and its change `delta_err`; the
    /// right side gets the negation.
    pub fn steer(err: f32, delta_err: f32) -> f32 {
        let steer = (err * Self::P + delta_err * Self::D).clamp(-Self::MAX_STEER, Self::MAX_STEER);
        let shifted = if steer < 0.0 {
            steer - Self::MIN_STEER
        } else {
            steer + Self::MIN_STEER
        };
        Rover::range_check_power(shifted)
    }
}

impl Behavior<Rover> for MakeTurn {
    fn on_initialize(&mut self, rover: &mut Rover) {
        info!(turn = self.turn, "MakeTurn started: {rover}");
        self.initial_heading = rover.heading();
        self.last_err = self.turn;
        self.in_range = 0;
    }

    fn on_execute(&mut self, rover: &mut Rover, _elapsed_secs: f64) -> State {
        let turned = rover.relative_heading(self.initial_heading);
        let err = self.turn - turned;
        let steer = Self::steer(err, self.last_err - err);
        rover.drive(steer, -steer);

        debug!(turned, err, steer, "MakeTurn: {rover}");
        self.last_err = err;

        if err.abs() < Self::TOLERANCE_DEG {
            self.in_range += 1;
        } else {
            self.in_range = 0;
        }
        if self.in_range >= Self::SETTLE_TICKS {
            State::NormalEnd
        } else {
            State::StillRunning
        }
    }

    fn on_end(&mut self, rover: &mut Rover, reason: State) {
        info!(state = %reason, "MakeTurn ended: {rover}");
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " [turn={}]", self.turn)
    }
}

// ── MakeSmoothTurn ────────────────────────────────────────────────────────────

/// Arc through a relative angle while still moving forward.
#[derive(Debug, Clone)]
pub struct MakeSmoothTurn {
    turn: f32,
    initial_heading: f32,
}

impl MakeSmoothTurn {
    pub const LEFT_POWER: f32 = 0.25;
    pub const RIGHT_POWER: f32 = 0.2;

    pub fn new(turn: f32) -> Self {
        Self {
            turn,
            initial_heading: 0.0,
        }
    }

    pub fn into_command(self) -> Command<Rover> {
        let timeout = turn_timeout(self.turn);
        Command::new("MakeSmoothTurn", timeout, self)
    }
}

impl Behavior<Rover> for MakeSmoothTurn {
    fn on_initialize(&mut self, rover: &mut Rover) {
        info!(turn = self.turn, "MakeSmoothTurn started: {rover}");
        self.initial_heading = rover.heading();
    }

    fn on_execute(&mut self, rover: &mut Rover, _elapsed_secs: f64) -> State {
        let turned = rover.relative_heading(self.initial_heading);
        rover.drive(Self::LEFT_POWER, Self::RIGHT_POWER);
        debug!(turned, "MakeSmoothTurn: {rover}");

        if turned.abs() >= self.turn.abs() {
            State::NormalEnd
        } else {
            State::StillRunning
        }
    }

    fn on_end(&mut self, rover: &mut Rover, reason: State) {
        info!(state = %reason, "MakeSmoothTurn ended: {rover}");
    }
}

// ── DriveStraight ─────────────────────────────────────────────────────────────

/// Hold a gyro heading, nudged by red (side) stanchions, until a yellow
/// (corner) stanchion has been passed.
///
/// A red stanchion's apparent height says how far off the course line the
/// rover is; it is turned into a heading correction that lasts until two
/// seconds pass without another red sighting.
#[derive(Debug, Clone)]
pub struct DriveStraight {
    /// Requested heading (absolute, or relative to the heading at start).
    heading: f32,
    relative: bool,
    desired_heading: f32,

    /// Stanchion counts are not evaluated before this much time has passed.
    min_secs: f64,

    power: f32,
    max_power: f32,
    p: f32,
    d: f32,

    last_ang_err: f32,
    heading_correction: f32,

    /// Running while a red-stanchion correction is in effect.
    correction_timer: Timer,

    initial_red: u32,
    initial_yellow: u32,
}

impl DriveStraight {
    /// Effectively unbounded; the stanchion watchdog ends a stuck run.
    pub const TIMEOUT_SECS: f64 = 3600.0;

    /// Box height of a red stanchion seen from the course line.
    pub const TARGET_BOX_HEIGHT: i32 = 60;

    /// Degrees of correction per pixel of box height error.
    pub const CORRECTION_GAIN: f32 = 0.2;
    pub const MAX_CORRECTION_DEG: f32 = 10.0;

    /// A correction lapses after this long without a red sighting.
    pub const CORRECTION_HOLD_SECS: f64 = 2.0;

    pub fn new(heading: f32, min_secs: f64, relative: bool, tuning: &DriveConfig) -> Self {
        let mut correction_timer = Timer::new();
        correction_timer.pause();
        Self {
            heading,
            relative,
            desired_heading: heading,
            min_secs,
            power: tuning.straight_power,
            max_power: tuning.straight_max_power(),
            p: tuning.straight_p,
            d: tuning.straight_d,
            last_ang_err: 0.0,
            heading_correction: 0.0,
            correction_timer,
            initial_red: 0,
            initial_yellow: 0,
        }
    }

    pub fn into_command(self) -> Command<Rover> {
        Command::new("DriveStraight", Self::TIMEOUT_SECS, self)
    }

    fn reset_counts(&mut self, rover: &Rover) {
        self.initial_red = rover.counter(Found::Red);
        self.initial_yellow = rover.counter(Found::Yellow);
    }

    fn red_count(&self, rover: &Rover) -> u32 {
        rover.counter(Found::Red) - self.initial_red
    }

    fn yellow_count(&self, rover: &Rover) -> u32 {
        rover.counter(Found::Yellow) - self.initial_yellow
    }

    /// Update the red-stanchion heading correction from the latest frame.
    fn update_correction(&mut self, rover: &Rover) {
        let record = rover.vision_record();
        match record.found {
            Found::Red => {
                self.correction_timer.start();
                self.heading_correction =
                    (Self::TARGET_BOX_HEIGHT as f32 - record.box_height as f32)
                        * Self::CORRECTION_GAIN;
            }
            Found::None => {
                if self.correction_timer.is_running()
                    && self.correction_timer.secs_elapsed() >= Self::CORRECTION_HOLD_SECS
                {
                    self.heading_correction = 0.0;
                    self.correction_timer.pause();
                }
            }
            Found::Yellow => {}
        }
        self.heading_correction = self
            .heading_correction
            .clamp(-Self::MAX_CORRECTION_DEG, Self::MAX_CORRECTION_DEG);
    }
}

impl Behavior<Rover> for DriveStraight {
    fn on_initialize(&mut self, rover: &mut Rover) {
        self.desired_heading = if self.relative {
            (rover.heading() + self.heading).rem_euclid(360.0)
        } else {
            self.heading
        };
        self.last_ang_err = 0.0;
        self.heading_correction = 0.0;
        self.correction_timer.pause();
        self.reset_counts(rover);
        info!(desired_heading = self.desired_heading, "DriveStraight started: {rover}");
    }

    fn on_execute(&mut self, rover: &mut Rover, elapsed_secs: f64) -> State {
        let current = rover.heading();
        self.update_correction(rover);

        let ang_err = angle_diff(self.desired_heading + self.heading_correction, current);
        let ang_err_change = ang_err - self.last_ang_err;
        let adjust = self.p * ang_err + self.d * ang_err_change;

        // A negative error means the rover drifted clockwise, so the right
        // side needs more power.
        let left = Rover::range_check_power((self.power * (1.0 + adjust)).min(self.max_power));
        let right = Rover::range_check_power((self.power * (1.0 - adjust)).min(self.max_power));
        rover.drive(left, right);

        debug!(
            desired_heading = self.desired_heading,
            heading = current,
            ang_err,
            left,
            right,
            red = self.red_count(rover),
            yellow = self.yellow_count(rover),
            correction = self.heading_correction,
            "DriveStraight: {rover}"
        );
        self.last_ang_err = ang_err;

        if elapsed_secs < self.min_secs {
            self.reset_counts(rover);
            return State::StillRunning;
        }

        if self.yellow_count(rover) >= 1 && self.red_count(rover) >= 1 {
            info!("DriveStraight found the corner stanchion: {rover}");
            return State::NormalEnd;
        }
        State::StillRunning
    }

    fn on_end(&mut self, rover: &mut Rover, _reason: State) {
        rover.coast();
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " [desired={:.1}, correction={:.1}]",
            self.desired_heading, self.heading_correction
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
