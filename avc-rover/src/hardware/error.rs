/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type shared by every hardware driver.
//!
//! Each variant carries the raw values involved so the rover can log a
//! complete `warn!`/`error!` event without further parsing.  Sensor errors end
//! the run (the rover marks itself crashed); actuator errors are logged and
//! the run continues.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    /// A requested value lies outside the range the device accepts.  The
    /// device state is left unchanged.
    #[error("{what} value {value} outside of [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Reading or writing a device file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every read attempt caught the writer mid-update (the leading and
    /// trailing frame counters never agreed).
    #[error(
        "vision record still torn after {attempts} attempts \
         (frame {frame_count}, safety frame {safety_frame_count})"
    )]
    TornRecord {
        attempts: u32,
        frame_count: i32,
        safety_frame_count: i32,
    },

    /// The record buffer is shorter than the fixed record layout.
    #[error("vision record is {len} bytes, expected {expected}")]
    ShortRecord { len: usize, expected: usize },

    /// The device cannot be used at all, e.g. a disconnected sensor.
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl HardwareError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HardwareError::Io {
            path: path.into(),
            source,
        }
    }
}
