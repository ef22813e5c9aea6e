/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! AVC rover – cooperative command framework and course drive behaviours
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── timer.rs        – stopwatch and period-aligned sleeps
//! ├── command/        – Command state machine, Sequence, Parallel
//! ├── scheduler/      – fixed-rate tick loop
//! ├── config/         – YAML rover configuration
//! ├── hardware/       – device traits, vision record file, sysfs LEDs, simulation
//! └── rover/          – Rover context, drive commands, mission and routes
//! ```

pub mod command;
pub mod config;
pub mod hardware;
pub mod rover;
pub mod scheduler;
pub mod timer;
