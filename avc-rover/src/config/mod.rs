//! Rover configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! tick_rate_hz: 20
//! route: long            # long | short
//! vision_record: /dev/shm/stanchions
//! leds_sysfs_prefix: /sys/class/leds/beaglebone:green:usr
//! stanchion_timeout_secs: 2.0
//! drive:
//!   power: 0.2
//!   short_side_secs: 2.0
//!   long_side_secs: 3.0
//!   stop_secs: 2.0
//!   settle_secs: 0.25
//!   straight_power: 0.15
//!   straight_p: 0.04
//!   straight_d: 0.025
//! ```
//!
//! Every key is optional; a missing key takes the value shown above.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::scheduler::DEFAULT_RATE_HZ;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Shared-memory file the vision process keeps overwriting.
pub const DEFAULT_VISION_RECORD: &str = "/dev/shm/stanchions";

/// Prefix of the four on-board user LED directories (`…usr0` to `…usr3`).
pub const DEFAULT_LEDS_SYSFS_PREFIX: &str = "/sys/class/leds/beaglebone:green:usr";

/// Longest gap between two stanchion sightings before the run is abandoned.
pub const DEFAULT_STANCHION_TIMEOUT_SECS: f64 = 2.0;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Default, Deserialize)]
struct RoverConfigFile {
    tick_rate_hz: Option<u32>,
    route: Option<Route>,
    vision_record: Option<PathBuf>,
    leds_sysfs_prefix: Option<String>,
    stanchion_timeout_secs: Option<f64>,
    #[serde(default)]
    drive: DriveConfigEntry,
}

/// `drive:` section as it appears in the YAML file.
#[derive(Debug, Default, Deserialize)]
struct DriveConfigEntry {
    power: Option<f32>,
    short_side_secs: Option<f64>,
    long_side_secs: Option<f64>,
    stop_secs: Option<f64>,
    settle_secs: Option<f64>,
    straight_power: Option<f32>,
    straight_p: Option<f32>,
    straight_d: Option<f32>,
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// Which way around the course the rover drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
pub enum Route {
    /// All four sides of the course, corner detection by yellow stanchion.
    #[default]
    #[serde(rename = "long")]
    #[value(name = "long")]
    LongWay,

    /// Stanchion-guided straight run followed by a single turn.
    #[serde(rename = "short")]
    #[value(name = "short")]
    ShortWay,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Route::LongWay => "long",
            Route::ShortWay => "short",
        })
    }
}

// ── Public data structures ────────────────────────────────────────────────────

/// Tuning constants used by the route builders and drive commands.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveConfig {
    /// Forward power of the corner-to-corner drives.
    pub power: f32,
    /// Drive time limit for a short side of the course, in seconds.
    pub short_side_secs: f64,
    /// Drive time limit for a long side of the course, in seconds.
    pub long_side_secs: f64,
    /// Coast time after each drive before turning.
    pub stop_secs: f64,
    /// Idle time at the start of a run so the operator can step away.
    pub settle_secs: f64,
    /// Base power of the stanchion-guided straight drive.
    pub straight_power: f32,
    pub straight_p: f32,
    pub straight_d: f32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            power: 0.2,
            short_side_secs: 2.0,
            long_side_secs: 3.0,
            stop_secs: 2.0,
            settle_secs: 0.25,
            straight_power: 0.15,
            straight_p: 0.04,
            straight_d: 0.025,
        }
    }
}

impl DriveConfig {
    /// Each side of a straight drive is capped at one and a half times the
    /// base power.
    pub fn straight_max_power(&self) -> f32 {
        self.straight_power * 1.5
    }
}

/// Complete rover configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RoverConfig {
    pub tick_rate_hz: u32,
    pub route: Route,
    pub vision_record: PathBuf,
    pub leds_sysfs_prefix: String,
    pub stanchion_timeout_secs: f64,
    pub drive: DriveConfig,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_RATE_HZ,
            route: Route::default(),
            vision_record: PathBuf::from(DEFAULT_VISION_RECORD),
            leds_sysfs_prefix: DEFAULT_LEDS_SYSFS_PREFIX.to_string(),
            stanchion_timeout_secs: DEFAULT_STANCHION_TIMEOUT_SECS,
            drive: DriveConfig::default(),
        }
    }
}

impl RoverConfig {
    /// Parses `path` into a configuration, filling absent keys with defaults.
    ///
    /// An empty file yields [`RoverConfig::default`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is structurally
    /// invalid, or a value is out of range (zero tick rate, negative or
    /// non-finite durations).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading rover configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: RoverConfigFile = if content.trim().is_empty() {
            warn!("Configuration file is empty, using default configuration");
            RoverConfigFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let config = Self::from_file(file);
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        debug!(?config, "rover configuration loaded");
        Ok(config)
    }

    fn from_file(file: RoverConfigFile) -> Self {
        let defaults = Self::default();
        let drive_defaults = defaults.drive;
        let d = file.drive;

        Self {
            tick_rate_hz: file.tick_rate_hz.unwrap_or(defaults.tick_rate_hz),
            route: file.route.unwrap_or(defaults.route),
            vision_record: file.vision_record.unwrap_or(defaults.vision_record),
            leds_sysfs_prefix: file.leds_sysfs_prefix.unwrap_or(defaults.leds_sysfs_prefix),
            stanchion_timeout_secs: file
                .stanchion_timeout_secs
                .unwrap_or(defaults.stanchion_timeout_secs),
            drive: DriveConfig {
                power: d.power.unwrap_or(drive_defaults.power),
                short_side_secs: d.short_side_secs.unwrap_or(drive_defaults.short_side_secs),
                long_side_secs: d.long_side_secs.unwrap_or(drive_defaults.long_side_secs),
                stop_secs: d.stop_secs.unwrap_or(drive_defaults.stop_secs),
                settle_secs: d.settle_secs.unwrap_or(drive_defaults.settle_secs),
                straight_power: d.straight_power.unwrap_or(drive_defaults.straight_power),
                straight_p: d.straight_p.unwrap_or(drive_defaults.straight_p),
                straight_d: d.straight_d.unwrap_or(drive_defaults.straight_d),
            },
        }
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_hz == 0 {
            bail!("tick_rate_hz must be at least 1");
        }

        let durations = [
            ("stanchion_timeout_secs", self.stanchion_timeout_secs),
            ("drive.short_side_secs", self.drive.short_side_secs),
            ("drive.long_side_secs", self.drive.long_side_secs),
            ("drive.stop_secs", self.drive.stop_secs),
            ("drive.settle_secs", self.drive.settle_secs),
        ];
        for (key, secs) in durations {
            if !secs.is_finite() || secs < 0.0 {
                bail!("{key} must be a non-negative number of seconds, got {secs}");
            }
        }

        let powers = [
            ("drive.power", self.drive.power),
            ("drive.straight_power", self.drive.straight_power),
        ];
        for (key, power) in powers {
            if !(-1.0..=1.0).contains(&power) {
                bail!("{key} must be within [-1, 1], got {power}");
            }
        }

        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RoverConfig::default();
        assert_eq!(cfg.tick_rate_hz, 20);
        assert_eq!(cfg.route, Route::LongWay);
        assert_eq!(cfg.vision_record, PathBuf::from("/dev/shm/stanchions"));
        assert_eq!(cfg.leds_sysfs_prefix, "/sys/class/leds/beaglebone:green:usr");
        assert_eq!(cfg.stanchion_timeout_secs, 2.0);
        assert_eq!(cfg.drive.power, 0.2);
        assert_eq!(cfg.drive.short_side_secs, 2.0);
        assert_eq!(cfg.drive.long_side_secs, 3.0);
        assert_eq!(cfg.drive.settle_secs, 0.25);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn straight_max_power_is_one_and_a_half_times_base() {
        let drive = DriveConfig::default();
        assert!((drive.straight_max_power() - 0.225).abs() < 1e-6);
    }

    // ── load_from_file ────────────────────────────────────────────────────────

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
tick_rate_hz: 50
route: short
vision_record: /tmp/stanchions
leds_sysfs_prefix: /tmp/leds/usr
stanchion_timeout_secs: 3.5
drive:
  power: 0.3
  short_side_secs: 1.5
  long_side_secs: 4.0
  stop_secs: 1.0
  settle_secs: 0.5
  straight_power: 0.1
  straight_p: 0.05
  straight_d: 0.02
"#;
        let f = yaml_tempfile(yaml);
        let cfg = RoverConfig::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.tick_rate_hz, 50);
        assert_eq!(cfg.route, Route::ShortWay);
        assert_eq!(cfg.vision_record, PathBuf::from("/tmp/stanchions"));
        assert_eq!(cfg.leds_sysfs_prefix, "/tmp/leds/usr");
        assert_eq!(cfg.stanchion_timeout_secs, 3.5);
        assert_eq!(cfg.drive.power, 0.3);
        assert_eq!(cfg.drive.long_side_secs, 4.0);
        assert_eq!(cfg.drive.settle_secs, 0.5);
        assert_eq!(cfg.drive.straight_p, 0.05);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let yaml = "route: long\ndrive:\n  power: 0.25\n";
        let f = yaml_tempfile(yaml);
        let cfg = RoverConfig::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.tick_rate_hz, DEFAULT_RATE_HZ);
        assert_eq!(cfg.drive.power, 0.25);
        assert_eq!(cfg.drive.stop_secs, 2.0, "untouched drive keys keep defaults");
        assert_eq!(cfg.stanchion_timeout_secs, DEFAULT_STANCHION_TIMEOUT_SECS);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let f = yaml_tempfile("\n");
        let cfg = RoverConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg, RoverConfig::default());
    }

    #[test]
    fn missing_file_returns_error() {
        let result = RoverConfig::load_from_file(Path::new("/nonexistent/path/rover.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(RoverConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn unknown_route_is_rejected() {
        let f = yaml_tempfile("route: sideways\n");
        assert!(RoverConfig::load_from_file(f.path()).is_err());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn zero_tick_rate_is_rejected() {
        let f = yaml_tempfile("tick_rate_hz: 0\n");
        let err = RoverConfig::load_from_file(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("tick_rate_hz"), "{err:#}");
    }

    #[test]
    fn negative_duration_is_rejected() {
        let f = yaml_tempfile("drive:\n  stop_secs: -1.0\n");
        let err = RoverConfig::load_from_file(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("drive.stop_secs"), "{err:#}");
    }

    #[test]
    fn power_outside_unit_range_is_rejected() {
        let mut cfg = RoverConfig::default();
        cfg.drive.power = 1.5;
        assert!(cfg.validate().is_err());
    }

    // ── Route ─────────────────────────────────────────────────────────────────

    #[test]
    fn route_display_matches_yaml_names() {
        assert_eq!(Route::LongWay.to_string(), "long");
        assert_eq!(Route::ShortWay.to_string(), "short");
    }
}
