/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! On-board user LEDs driven through sysfs.
//!
//! Each LED `N` lives under `<prefix>N/` and is controlled by two files:
//! `trigger` (written `none` once to take the LED away from the kernel's
//! heartbeat/mmc triggers) and `brightness` (`0` or `1`).

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::{check_indicator_state, HardwareError, Indicator};
use crate::config::DEFAULT_LEDS_SYSFS_PREFIX;

/// Number of user LEDs on the board.
pub const LED_COUNT: usize = 4;

/// [`Indicator`] showing a 4-bit state on the board's user LEDs, bit `N`
/// on LED `N`.
///
/// Only LEDs whose brightness actually changes are written.
#[derive(Debug, Clone)]
pub struct SysfsLeds {
    prefix: String,

    /// LEDs whose trigger has been set to `none`.
    claimed: [bool; LED_COUNT],

    /// Last brightness written per LED.
    lit: [bool; LED_COUNT],
}

impl Default for SysfsLeds {
    fn default() -> Self {
        Self::new(DEFAULT_LEDS_SYSFS_PREFIX)
    }
}

impl SysfsLeds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            claimed: [false; LED_COUNT],
            lit: [false; LED_COUNT],
        }
    }

    /// Directory of LED `led`.
    pub fn led_dir(&self, led: usize) -> PathBuf {
        PathBuf::from(format!("{}{}", self.prefix, led))
    }

    pub fn is_lit(&self, led: usize) -> bool {
        self.lit.get(led).copied().unwrap_or(false)
    }

    /// Switch one LED on or off.
    pub fn set_led(&mut self, led: usize, on: bool) -> Result<(), HardwareError> {
        if led >= LED_COUNT {
            return Err(HardwareError::OutOfRange {
                what: "LED index",
                value: led as f64,
                min: 0.0,
                max: (LED_COUNT - 1) as f64,
            });
        }

        let mut force = false;
        if !self.claimed[led] {
            self.write(led, "trigger", "none")?;
            self.claimed[led] = true;
            force = true;
        }

        if force || self.lit[led] != on {
            self.write(led, "brightness", if on { "1" } else { "0" })?;
            self.lit[led] = on;
        }
        Ok(())
    }

    fn write(&self, led: usize, file: &str, value: &str) -> Result<(), HardwareError> {
        let path = self.led_dir(led).join(file);
        debug!(path = %path.display(), value, "led write");
        fs::write(&path, value).map_err(|e| HardwareError::io(path, e))
    }
}

impl Indicator for SysfsLeds {
    fn set_state(&mut self, bits: u8) -> Result<(), HardwareError> {
        let bits = check_indicator_state(bits)?;
        for led in 0..LED_COUNT {
            self.set_led(led, (bits >> led) & 1 == 1)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
