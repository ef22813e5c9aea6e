/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the command scheduler.
//!
//! A command run itself never produces an error: its outcome is the terminal
//! [`State`](crate::command::State).  Errors here describe a scheduler that
//! could not be set up at all.

use thiserror::Error;

/// Error returned by [`Scheduler::new`](super::Scheduler::new) and the
/// run helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The tick rate must be at least 1 Hz.
    #[error("invalid tick rate {0} Hz: the rate must be at least 1 Hz")]
    InvalidRate(u32),
}
