/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Narrow interfaces to the rover's actuators and sensors.
//!
//! The control loop only ever sees these traits:
//!
//! | Trait | Role | Implementations |
//! |---|---|---|
//! | [`DriveMotor`] | one side of the drive train, power in `[-1, 1]` | [`sim::SimMotor`] |
//! | [`Gyro`] | absolute heading in degrees `[0, 360)` | [`sim::SimGyro`] |
//! | [`VisionSource`] | latest stanchion detection record | [`vision::FileVision`], [`sim::SimVision`] |
//! | [`Indicator`] | 4-bit status display | [`leds::SysfsLeds`], [`sim::SimIndicator`] |
//!
//! All traits require `Send` so the assembled [`Hardware`] can be moved onto
//! the blocking control-loop thread.

pub mod error;
pub mod leds;
pub mod sim;
pub mod vision;

pub use error::HardwareError;
pub use vision::{Found, VisionRecord};

/// Lowest legal drive power (full reverse).
pub const MIN_POWER: f32 = -1.0;

/// Highest legal drive power (full forward).
pub const MAX_POWER: f32 = 1.0;

/// Largest state accepted by [`Indicator::set_state`] (four LEDs).
pub const INDICATOR_MAX_STATE: u8 = 0x0f;

/// Reject `power` values outside `[MIN_POWER, MAX_POWER]`.
pub fn check_power(power: f32) -> Result<f32, HardwareError> {
    if (MIN_POWER..=MAX_POWER).contains(&power) {
        Ok(power)
    } else {
        Err(HardwareError::OutOfRange {
            what: "drive power",
            value: f64::from(power),
            min: f64::from(MIN_POWER),
            max: f64::from(MAX_POWER),
        })
    }
}

/// Reject indicator states that need more than four bits.
pub fn check_indicator_state(bits: u8) -> Result<u8, HardwareError> {
    if bits <= INDICATOR_MAX_STATE {
        Ok(bits)
    } else {
        Err(HardwareError::OutOfRange {
            what: "indicator state",
            value: f64::from(bits),
            min: 0.0,
            max: f64::from(INDICATOR_MAX_STATE),
        })
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// One side of a differential drive.
pub trait DriveMotor: Send {
    /// Apply `power` in `[-1, 1]`.  Out-of-range values are rejected with
    /// [`HardwareError::OutOfRange`] and the current output is kept.
    fn set(&mut self, power: f32) -> Result<(), HardwareError>;

    /// Power most recently applied.
    fn get(&self) -> f32;

    /// Move toward `target`, changing the output by at most `max_step`.
    fn seek(&mut self, target: f32, max_step: f32) -> Result<(), HardwareError> {
        let current = self.get();
        let wanted = target - current;
        let next = if wanted < -max_step {
            current - max_step
        } else if wanted > max_step {
            current + max_step
        } else {
            target
        };
        self.set(next)
    }

    /// Remove drive power entirely; the output reads 0 afterwards.
    fn disable(&mut self);
}

/// Absolute heading sensor.
pub trait Gyro: Send {
    /// Current heading in degrees, `[0, 360)`.
    fn read_heading(&mut self) -> Result<f32, HardwareError>;
}

/// Source of stanchion detections produced by the vision process.
pub trait VisionSource: Send {
    /// The most recent complete detection record.
    fn read_detection(&mut self) -> Result<VisionRecord, HardwareError>;
}

/// Small status display used to show progress along the course.
pub trait Indicator: Send {
    /// Show `bits` (0 to [`INDICATOR_MAX_STATE`]).
    fn set_state(&mut self, bits: u8) -> Result<(), HardwareError>;
}

// ── Hardware bundle ───────────────────────────────────────────────────────────

/// Every device the rover drives, assembled once at start-up and handed to
/// [`Rover::new`](crate::rover::Rover::new).
pub struct Hardware {
    pub left: Box<dyn DriveMotor>,
    pub right: Box<dyn DriveMotor>,
    pub gyro: Box<dyn Gyro>,
    pub vision: Box<dyn VisionSource>,
    pub indicator: Box<dyn Indicator>,
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware")
            .field("left", &self.left.get())
            .field("right", &self.right.get())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
