/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use avc_rover::command::State;
use avc_rover::config::{Route, RoverConfig};
use avc_rover::hardware::leds::SysfsLeds;
use avc_rover::hardware::sim::{SimBody, SimIndicator, SimVision};
use avc_rover::hardware::vision::FileVision;
use avc_rover::hardware::Hardware;
use avc_rover::rover::{build_mission, Rover};
use avc_rover::scheduler::{RunReport, Scheduler};

/// Red frames between two corner frames in the simulated course.
const SIM_REDS_PER_SIDE: usize = 8;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Autonomous course rover.
///
/// Example:
///   avc-rover -c rover.yaml --route short --simulate
#[derive(Debug, Parser)]
#[command(
    name = "avc-rover",
    about = "Autonomous course rover – runs one route around the course",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML rover configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Route to drive (overrides the configuration file).
    #[arg(short = 'r', long = "route", value_enum)]
    route: Option<Route>,

    /// Control loop rate in Hz (overrides the configuration file).
    #[arg(long = "rate")]
    rate: Option<u32>,

    /// Replace the vision record file and the board LEDs with simulated devices.
    #[arg(long = "simulate", default_value_t = false)]
    simulate: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("AVC rover starting up...");

    let cli = Cli::parse();

    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => match RoverConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load rover configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No configuration file provided, using default rover settings");
            RoverConfig::default()
        }
    };

    if let Some(route) = cli.route {
        config.route = route;
    }
    if let Some(rate) = cli.rate {
        config.tick_rate_hz = rate;
    }

    info!(
        route        = %config.route,
        rate_hz      = config.tick_rate_hz,
        vision       = %config.vision_record.display(),
        leds         = %config.leds_sysfs_prefix,
        stanchion_timeout_secs = config.stanchion_timeout_secs,
        simulate     = cli.simulate,
        "Configuration"
    );
    info!(drive = ?config.drive, "Drive tuning");

    // ── Interrupt on Ctrl-C / SIGTERM ─────────────────────────────────────────
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(()) => {
                    warn!("Shutdown signal received, stopping the rover");
                    interrupt.store(true, Ordering::SeqCst);
                }
                Err(e) => warn!("Signal handling unavailable: {e}"),
            }
        });
    }

    // ── Run the mission on a blocking thread ──────────────────────────────────
    let hardware = build_hardware(&config, cli.simulate);
    let run = tokio::task::spawn_blocking(move || run_mission(&config, hardware, interrupt)).await;

    let report = match run {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            error!("Mission could not run: {:#}", e);
            process::exit(1);
        }
        Err(e) => {
            error!("Control loop task failed: {e}");
            process::exit(1);
        }
    };

    info!(
        state        = %report.state,
        ticks        = report.ticks,
        elapsed_secs = report.elapsed_secs,
        "Mission finished"
    );
    if report.state != State::NormalEnd {
        process::exit(2);
    }
}

/// Assemble the device bundle.  Drive motors and gyro are always simulated;
/// `simulate` also swaps in a scripted camera and an in-memory indicator.
fn build_hardware(config: &RoverConfig, simulate: bool) -> Hardware {
    let body = SimBody::new();
    if simulate {
        info!(reds_per_side = SIM_REDS_PER_SIDE, "Using simulated vision and LEDs");
        body.hardware(
            Box::new(SimVision::course(SIM_REDS_PER_SIDE)),
            Box::new(SimIndicator::new()),
        )
    } else {
        warn!("Drive train and gyro are simulated; vision and LEDs are real");
        body.hardware(
            Box::new(FileVision::new(config.vision_record.clone())),
            Box::new(SysfsLeds::new(config.leds_sysfs_prefix.clone())),
        )
    }
}

fn run_mission(
    config: &RoverConfig,
    hardware: Hardware,
    interrupt: Arc<AtomicBool>,
) -> Result<RunReport> {
    let scheduler = Scheduler::new(config.tick_rate_hz)
        .with_context(|| format!("Cannot run at {} Hz", config.tick_rate_hz))?;

    let mut rover = Rover::new(hardware)
        .with_interrupt(interrupt)
        .with_stanchion_timeout(config.stanchion_timeout_secs);
    // All LEDs on until the first corner.
    rover.indicate(0x0f);

    let mut mission = build_mission(config.route, &config.drive);
    Ok(scheduler.run(&mut mission, &mut rover))
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
