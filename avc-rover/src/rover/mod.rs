/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The vehicle context shared by every drive command.
//!
//! [`Rover`] owns the devices and the per-run sensor snapshot.  Commands never
//! hold a reference to it; they receive `&mut Rover` on every hook (see
//! [`Behavior`](crate::command::Behavior)).
//!
//! Failure policy:
//!
//! | Source | Effect |
//! |---|---|
//! | gyro or vision read fails | run marked crashed (`error!`) |
//! | no new stanchion frame for `stanchion_timeout_secs` | run marked crashed |
//! | external interrupt flag set | run marked crashed |
//! | motor or indicator write fails | `warn!`, run continues |

pub mod drive;
pub mod mission;

pub use drive::{DrivePowerTime, DriveStraight, DriveToTurn, MakeSmoothTurn, MakeTurn};
pub use mission::{build_mission, Mission};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::DEFAULT_STANCHION_TIMEOUT_SECS;
use crate::hardware::{
    DriveMotor, Found, Gyro, Hardware, Indicator, VisionRecord, VisionSource, INDICATOR_MAX_STATE,
    MAX_POWER, MIN_POWER,
};
use crate::timer::Timer;

/// Largest change per call applied by [`Rover::seek_drive`].
pub const DEFAULT_SEEK_STEP: f32 = 0.05;

/// Signed difference `a - b` folded into `[-180, 180]` degrees.
pub fn angle_diff(a: f32, b: f32) -> f32 {
    let diff = a - b;
    if diff < -180.0 {
        diff + 360.0
    } else if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Counter slot of a stanchion kind.
fn slot(found: Found) -> usize {
    match found {
        Found::None => 0,
        Found::Red => 1,
        Found::Yellow => 2,
    }
}

pub struct Rover {
    left: Box<dyn DriveMotor>,
    right: Box<dyn DriveMotor>,
    gyro: Box<dyn Gyro>,
    vision: Box<dyn VisionSource>,
    indicator: Box<dyn Indicator>,

    /// Raw gyro heading at the start of the run.
    init_heading: f32,

    /// Heading since the start of the run, `[0, 360)`.
    heading: f32,

    vision_record: VisionRecord,

    /// Record of the frame before `vision_record`.
    vision_prev: VisionRecord,

    /// New stanchion frames seen per kind, indexed by [`slot`].
    stanchion_counts: [u32; 3],

    crashed: bool,

    /// Set from outside (signal handler) to stop the run.
    interrupt: Arc<AtomicBool>,

    waypoint: u8,

    /// Frame number of the last record that showed a stanchion.
    last_stanchion_frame: i32,

    /// Time since `last_stanchion_frame` arrived.
    stanchion_timer: Timer,

    stanchion_timeout_secs: f64,
}

impl Rover {
    pub fn new(hardware: Hardware) -> Self {
        let Hardware {
            left,
            right,
            gyro,
            vision,
            indicator,
        } = hardware;

        Self {
            left,
            right,
            gyro,
            vision,
            indicator,
            init_heading: 0.0,
            heading: 0.0,
            vision_record: VisionRecord::default(),
            vision_prev: VisionRecord::default(),
            stanchion_counts: [0; 3],
            crashed: false,
            interrupt: Arc::new(AtomicBool::new(false)),
            waypoint: 1,
            last_stanchion_frame: 0,
            stanchion_timer: Timer::new(),
            stanchion_timeout_secs: DEFAULT_STANCHION_TIMEOUT_SECS,
        }
    }

    /// Share an externally owned interrupt flag.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_stanchion_timeout(mut self, secs: f64) -> Self {
        self.stanchion_timeout_secs = secs;
        self
    }

    /// Flag that, once set, makes the next [`read_sensors`](Self::read_sensors)
    /// mark the run as crashed.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    // ── Run lifecycle ─────────────────────────────────────────────────────────

    /// Prepare for a new run through the course.
    pub fn reset(&mut self) {
        self.crashed = false;
        self.waypoint = 1;
        self.stanchion_counts = [0; 3];
        self.stanchion_timer.start();
        self.last_stanchion_frame = 0;
        self.vision_record.clear();
        self.vision_prev.clear();
        self.heading = 0.0;

        match self.gyro.read_heading() {
            Ok(heading) => self.init_heading = heading,
            Err(e) => {
                error!("Gyro not responding, unable to read initial heading: {e}");
                self.crashed = true;
            }
        }
    }

    /// Refresh heading and vision state; called once per tick.
    pub fn read_sensors(&mut self) {
        if self.interrupt.load(Ordering::SeqCst) {
            if !self.crashed {
                error!("Run interrupted from outside");
            }
            self.crashed = true;
        }

        match self.gyro.read_heading() {
            Ok(raw) => self.heading = (raw - self.init_heading).rem_euclid(360.0),
            Err(e) => {
                error!("Gyro not responding, unable to read heading: {e}");
                self.crashed = true;
            }
        }

        match self.vision.read_detection() {
            Ok(record) => {
                if record.frame_count != self.vision_record.frame_count {
                    self.vision_prev = self.vision_record;
                }
                self.vision_record = record;
            }
            Err(e) => {
                error!("Failed to read a valid stanchion record: {e}");
                self.vision_record.found = Found::None;
                self.crashed = true;
            }
        }

        let record = self.vision_record;
        if record.found != Found::None && record.frame_count != self.last_stanchion_frame {
            self.last_stanchion_frame = record.frame_count;
            self.stanchion_counts[slot(record.found)] += 1;
            self.stanchion_timer.start();
            debug!(
                frame = record.frame_count,
                found = ?record.found,
                box_height = record.box_height,
                "stanchion sighted"
            );
        } else if self.stanchion_timer.secs_elapsed() > self.stanchion_timeout_secs {
            error!(
                frame = record.frame_count,
                last_stanchion_frame = self.last_stanchion_frame,
                "No stanchion seen in the last {} seconds",
                self.stanchion_timeout_secs
            );
            self.crashed = true;
        }
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    // ── Sensor snapshot ───────────────────────────────────────────────────────

    /// Heading since the start of the run, `[0, 360)`.
    pub fn heading(&self) -> f32 {
        self.heading
    }

    /// Heading relative to `initial` (an earlier [`heading`](Self::heading)),
    /// `[-180, 180]`.
    pub fn relative_heading(&self, initial: f32) -> f32 {
        let mut rel = self.heading - initial;
        if rel < 0.0 {
            rel += 360.0;
        }
        if rel > 180.0 {
            rel -= 360.0;
        }
        rel
    }

    pub fn vision_record(&self) -> &VisionRecord {
        &self.vision_record
    }

    pub fn previous_vision_record(&self) -> &VisionRecord {
        &self.vision_prev
    }

    /// The latest frame shows a corner (yellow) stanchion.
    pub fn at_corner(&self) -> bool {
        self.vision_record.found == Found::Yellow
    }

    /// New stanchion frames of `kind` seen since the run started.
    pub fn counter(&self, kind: Found) -> u32 {
        self.stanchion_counts[slot(kind)]
    }

    pub fn waypoint(&self) -> u8 {
        self.waypoint
    }

    // ── Actuators ─────────────────────────────────────────────────────────────

    /// Clamp `power` into the legal motor range.
    pub fn range_check_power(power: f32) -> f32 {
        power.clamp(MIN_POWER, MAX_POWER)
    }

    /// Set both sides independently (allows turning and spinning).
    pub fn drive(&mut self, left: f32, right: f32) {
        if let Err(e) = self.left.set(left) {
            warn!(power = left, "left motor rejected power: {e}");
        }
        if let Err(e) = self.right.set(right) {
            warn!(power = right, "right motor rejected power: {e}");
        }
    }

    /// Move both sides toward the given powers by at most `max_step` each.
    pub fn seek_drive(&mut self, left: f32, right: f32, max_step: f32) {
        if let Err(e) = self.left.seek(left, max_step) {
            warn!(power = left, "left motor rejected power: {e}");
        }
        if let Err(e) = self.right.seek(right, max_step) {
            warn!(power = right, "right motor rejected power: {e}");
        }
    }

    /// Cut drive power and let the rover roll to a stop.
    pub fn coast(&mut self) {
        self.drive(0.0, 0.0);
    }

    /// Turn every actuator off at the end of a run.
    pub fn disable(&mut self) {
        self.coast();
    }

    pub fn left_power(&self) -> f32 {
        self.left.get()
    }

    pub fn right_power(&self) -> f32 {
        self.right.get()
    }

    // ── Indicator ─────────────────────────────────────────────────────────────

    /// Show `bits` on the indicator; failures are only logged.
    pub fn indicate(&mut self, bits: u8) {
        if let Err(e) = self.indicator.set_state(bits) {
            warn!(bits, "indicator update failed: {e}");
        }
    }

    /// Show the current waypoint number and move on to the next one.
    pub fn next_waypoint(&mut self) {
        let shown = self.waypoint & INDICATOR_MAX_STATE;
        self.indicate(shown);
        self.waypoint = self.waypoint.wrapping_add(1);
    }
}

impl Drop for Rover {
    fn drop(&mut self) {
        self.coast();
        self.left.disable();
        self.right.disable();
    }
}

impl fmt::Display for Rover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rover(left={:.3}, right={:.3}, heading={:.1})",
            self.left.get(),
            self.right.get(),
            self.heading
        )
    }
}

impl fmt::Debug for Rover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rover")
            .field("heading", &self.heading)
            .field("vision_record", &self.vision_record)
            .field("stanchion_counts", &self.stanchion_counts)
            .field("crashed", &self.crashed)
            .field("waypoint", &self.waypoint)
            .finish_non_exhaustive()
    }
}

// ── Test support ──────────────────────────────────────────────────────────────

/// Rover wired to simulated devices, shared by the rover, drive and mission
/// tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::hardware::sim::{SimBody, SimIndicator, SimVision};

    pub struct SimRover {
        pub rover: Rover,
        pub body: SimBody,
        pub shown: SimIndicator,
    }

    pub fn sim_rover(vision: SimVision) -> SimRover {
        let body = SimBody::new();
        let shown = SimIndicator::new();
        let rover = Rover::new(body.hardware(Box::new(vision), Box::new(shown.clone())));
        SimRover { rover, body, shown }
    }

    /// Record with matching frame counters.
    pub fn frame(frame: i32, found: Found, box_height: i32) -> VisionRecord {
        VisionRecord {
            frame_count: frame,
            safety_frame_count: frame,
            ..crate::hardware::sim::sighting(found, box_height)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
