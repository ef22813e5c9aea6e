/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulated devices for bench runs and tests.
//!
//! A [`SimBody`] holds the kinematic state shared by the two [`SimMotor`]s
//! and the [`SimGyro`].  The heading integrates the drive differential over
//! wall time:
//!
//! ```text
//! d(heading)/dt = (left - right) * turn_rate_dps
//! ```
//!
//! so more power on the left turns the rover clockwise (heading increases).
//! [`SimVision`] replays scripted detection records and [`SimIndicator`]
//! remembers every state it was asked to show.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::{
    check_indicator_state, check_power, DriveMotor, Found, Gyro, Hardware, HardwareError,
    Indicator, VisionRecord, VisionSource,
};

// ── SimBody ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct BodyState {
    heading: f32,
    left: f32,
    right: f32,
    turn_rate_dps: f32,
    gyro_online: bool,
    last_update: Instant,
}

impl BodyState {
    /// Integrate the heading up to now using the powers applied so far.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.heading =
            (self.heading + (self.left - self.right) * self.turn_rate_dps * dt).rem_euclid(360.0);
    }
}

/// Side of the drive train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Shared kinematic state of a simulated rover.  Clones share the state.
#[derive(Debug, Clone)]
pub struct SimBody {
    inner: Arc<Mutex<BodyState>>,
}

impl Default for SimBody {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBody {
    /// Turn rate in degrees per second at a full (+1 / -1) power differential.
    pub const DEFAULT_TURN_RATE_DPS: f32 = 100.0;

    pub fn new() -> Self {
        Self::with_turn_rate(Self::DEFAULT_TURN_RATE_DPS)
    }

    pub fn with_turn_rate(turn_rate_dps: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BodyState {
                heading: 0.0,
                left: 0.0,
                right: 0.0,
                turn_rate_dps,
                gyro_online: true,
                last_update: Instant::now(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BodyState>, HardwareError> {
        self.inner
            .lock()
            .map_err(|_| HardwareError::Unavailable("simulated body lock poisoned".into()))
    }

    /// Current heading in degrees, `[0, 360)`.
    pub fn heading(&self) -> Result<f32, HardwareError> {
        let mut state = self.lock()?;
        state.advance();
        Ok(state.heading)
    }

    /// Teleport to `degrees` (wrapped into `[0, 360)`).
    pub fn set_heading(&self, degrees: f32) -> Result<(), HardwareError> {
        let mut state = self.lock()?;
        state.advance();
        state.heading = degrees.rem_euclid(360.0);
        Ok(())
    }

    /// Current `(left, right)` power outputs.
    pub fn powers(&self) -> Result<(f32, f32), HardwareError> {
        let state = self.lock()?;
        Ok((state.left, state.right))
    }

    /// Make [`SimGyro::read_heading`] fail (`false`) or succeed again.
    pub fn set_gyro_online(&self, online: bool) -> Result<(), HardwareError> {
        self.lock()?.gyro_online = online;
        Ok(())
    }

    pub fn motor(&self, side: Side) -> SimMotor {
        SimMotor {
            body: self.clone(),
            side,
        }
    }

    pub fn gyro(&self) -> SimGyro {
        SimGyro { body: self.clone() }
    }

    /// Bundle this body's motors and gyro with the given vision source and
    /// indicator.
    pub fn hardware(
        &self,
        vision: Box<dyn VisionSource>,
        indicator: Box<dyn Indicator>,
    ) -> Hardware {
        Hardware {
            left: Box::new(self.motor(Side::Left)),
            right: Box::new(self.motor(Side::Right)),
            gyro: Box::new(self.gyro()),
            vision,
            indicator,
        }
    }

    fn apply(&self, side: Side, power: f32) -> Result<(), HardwareError> {
        let mut state = self.lock()?;
        state.advance();
        match side {
            Side::Left => state.left = power,
            Side::Right => state.right = power,
        }
        Ok(())
    }
}

// ── SimMotor / SimGyro ────────────────────────────────────────────────────────

/// One side of the simulated drive train.
#[derive(Debug, Clone)]
pub struct SimMotor {
    body: SimBody,
    side: Side,
}

impl DriveMotor for SimMotor {
    fn set(&mut self, power: f32) -> Result<(), HardwareError> {
        let power = check_power(power)?;
        self.body.apply(self.side, power)
    }

    fn get(&self) -> f32 {
        match self.body.powers() {
            Ok((left, right)) => match self.side {
                Side::Left => left,
                Side::Right => right,
            },
            Err(_) => 0.0,
        }
    }

    fn disable(&mut self) {
        // Zero is always in range and only a poisoned lock can fail here.
        let _ = self.body.apply(self.side, 0.0);
    }
}

/// Gyro reading the simulated heading.
#[derive(Debug, Clone)]
pub struct SimGyro {
    body: SimBody,
}

impl Gyro for SimGyro {
    fn read_heading(&mut self) -> Result<f32, HardwareError> {
        let mut state = self.body.lock()?;
        if !state.gyro_online {
            return Err(HardwareError::Unavailable("simulated gyro offline".into()));
        }
        state.advance();
        Ok(state.heading)
    }
}

// ── SimVision ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Play the script once, then keep returning the last record.
    Once,
    /// Loop forever, stamping every read as a new frame.
    Cycle,
}

/// [`VisionSource`] replaying a scripted list of records.
#[derive(Debug, Clone)]
pub struct SimVision {
    script: Vec<VisionRecord>,
    cursor: usize,
    replay: Replay,
    frame: i32,
}

impl SimVision {
    /// Return `records` in order, then repeat the last one.  Records are
    /// returned exactly as given, torn ones included.
    pub fn scripted(records: Vec<VisionRecord>) -> Self {
        Self {
            script: records,
            cursor: 0,
            replay: Replay::Once,
            frame: 0,
        }
    }

    /// Loop over `records` forever.  Each read gets the next frame number in
    /// both frame counters.
    pub fn cycling(records: Vec<VisionRecord>) -> Self {
        Self {
            replay: Replay::Cycle,
            ..Self::scripted(records)
        }
    }

    /// A camera that never delivers a record.
    pub fn offline() -> Self {
        Self::scripted(Vec::new())
    }

    /// Bench course: `reds` frames of a red stanchion at the target distance
    /// followed by one yellow (corner) frame, looped.
    pub fn course(reds: usize) -> Self {
        let red = sighting(Found::Red, 60);
        let mut records = vec![red; reds];
        records.push(sighting(Found::Yellow, 60));
        Self::cycling(records)
    }
}

/// A single-stanchion record (frame counters left at zero).
pub fn sighting(found: Found, box_height: i32) -> VisionRecord {
    VisionRecord {
        found,
        box_width: box_height / 3,
        box_height,
        x_mid: 160,
        y_bot: 180,
        ..VisionRecord::default()
    }
}

impl VisionSource for SimVision {
    fn read_detection(&mut self) -> Result<VisionRecord, HardwareError> {
        if self.script.is_empty() {
            return Err(HardwareError::Unavailable("simulated camera offline".into()));
        }

        match self.replay {
            Replay::Once => {
                let index = self.cursor.min(self.script.len() - 1);
                self.cursor = self.cursor.saturating_add(1);
                Ok(self.script[index])
            }
            Replay::Cycle => {
                let mut record = self.script[self.cursor % self.script.len()];
                self.cursor = (self.cursor + 1) % self.script.len();
                self.frame = self.frame.wrapping_add(1);
                record.frame_count = self.frame;
                record.safety_frame_count = self.frame;
                Ok(record)
            }
        }
    }
}

// ── SimIndicator ──────────────────────────────────────────────────────────────

/// [`Indicator`] that records every state shown.  Clones share the history.
#[derive(Debug, Clone, Default)]
pub struct SimIndicator {
    history: Arc<Mutex<Vec<u8>>>,
}

impl SimIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every state shown so far, oldest first.
    pub fn history(&self) -> Vec<u8> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

impl Indicator for SimIndicator {
    fn set_state(&mut self, bits: u8) -> Result<(), HardwareError> {
        let bits = check_indicator_state(bits)?;
        self.history
            .lock()
            .map_err(|_| HardwareError::Unavailable("indicator history lock poisoned".into()))?
            .push(bits);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
