//! # Configuration Module
//!
//! Session settings supplied at startup and the control profile loaded from
//! a TOML file. Both are read once and never change while the client runs.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, UplinkError};
use crate::packet::codec::CodecKind;
use crate::packet::protocol::COMMAND_MAX;

/// Highest gear a profile may configure
pub const MAX_GEAR_LIMIT: i8 = 9;

/// Per-run settings, normally from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Receiver address (`host:port`)
    pub address: String,
    /// Control profile path
    pub cfg_path: PathBuf,
    pub invert_esc: bool,
    pub invert_steering: bool,
    /// Steering offset in per-mille, added after inversion
    pub trim_steering: i32,
    pub codec: CodecKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            cfg_path: PathBuf::from(default_cfg_path()),
            invert_esc: false,
            invert_steering: false,
            trim_steering: 0,
            codec: CodecKind::default(),
        }
    }
}

impl SessionConfig {
    /// Validate session values
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the address is empty or the trim is out of
    /// range.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(UplinkError::InvalidConfig(
                "address cannot be empty".to_string(),
            ));
        }

        if !(-COMMAND_MAX..=COMMAND_MAX).contains(&self.trim_steering) {
            return Err(UplinkError::InvalidConfig(format!(
                "trim_steering must be between {} and {}",
                -COMMAND_MAX, COMMAND_MAX
            )));
        }

        Ok(())
    }
}

/// Control profile: which inputs drive which command, and loop timing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Profile {
    #[serde(default = "default_steering")]
    pub steering: AxisBinding,

    #[serde(default = "default_esc")]
    pub esc: AxisBinding,

    #[serde(default)]
    pub gear: GearBinding,

    #[serde(default)]
    pub timing: TimingConfig,
}

/// One analog axis driving one command
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AxisBinding {
    /// Index into the opened devices
    #[serde(default)]
    pub device: usize,

    /// Axis index on that device
    pub axis: usize,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default)]
    pub expo: f32,

    #[serde(default)]
    pub invert: bool,
}

/// Buttons that shift gears
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct GearBinding {
    #[serde(default)]
    pub device: usize,

    #[serde(default = "default_gear_up_button")]
    pub up_button: usize,

    #[serde(default = "default_gear_down_button")]
    pub down_button: usize,

    #[serde(default = "default_max_gear")]
    pub max_gear: i8,
}

/// Sampling loop cadence
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,

    #[serde(default = "default_diagnostic_period_s")]
    pub diagnostic_period_s: u64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            steering: default_steering(),
            esc: default_esc(),
            gear: GearBinding::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for GearBinding {
    fn default() -> Self {
        Self {
            device: 0,
            up_button: default_gear_up_button(),
            down_button: default_gear_down_button(),
            max_gear: default_max_gear(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: default_sample_period_ms(),
            diagnostic_period_s: default_diagnostic_period_s(),
        }
    }
}

impl TimingConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn diagnostic_period(&self) -> Duration {
        Duration::from_secs(self.diagnostic_period_s)
    }
}

// Default value functions
pub fn default_address() -> String { "127.0.0.1:1053".to_string() }
pub fn default_cfg_path() -> &'static str { "config/profile.toml" }

fn default_steering() -> AxisBinding {
    AxisBinding { device: 0, axis: 0, deadzone: default_deadzone(), expo: 0.0, invert: false }
}
// Gamepad Y axes report "up" as negative, so forward throttle needs inverting
fn default_esc() -> AxisBinding {
    AxisBinding { device: 0, axis: 1, deadzone: default_deadzone(), expo: 0.2, invert: true }
}
fn default_deadzone() -> f32 { 0.05 }

fn default_gear_up_button() -> usize { 5 }
fn default_gear_down_button() -> usize { 4 }
fn default_max_gear() -> i8 { 3 }

fn default_sample_period_ms() -> u64 { 4 }
fn default_diagnostic_period_s() -> u64 { 5 }

impl Profile {
    /// Load a control profile from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_uplink::config::Profile;
    ///
    /// let profile = Profile::load("config/profile.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate a profile from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(contents)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validate profile values
    ///
    /// Device, axis and button indices are checked later against the devices
    /// actually opened.
    fn validate(&self) -> Result<()> {
        for (name, binding) in [("steering", &self.steering), ("esc", &self.esc)] {
            if !(0.0..=0.25).contains(&binding.deadzone) {
                return Err(UplinkError::InvalidConfig(format!(
                    "{}.deadzone must be between 0.0 and 0.25",
                    name
                )));
            }

            if !(0.0..=1.0).contains(&binding.expo) {
                return Err(UplinkError::InvalidConfig(format!(
                    "{}.expo must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.gear.up_button == self.gear.down_button {
            return Err(UplinkError::InvalidConfig(
                "gear up_button and down_button must differ".to_string(),
            ));
        }

        if self.gear.max_gear < 1 || self.gear.max_gear > MAX_GEAR_LIMIT {
            return Err(UplinkError::InvalidConfig(format!(
                "gear.max_gear must be between 1 and {}",
                MAX_GEAR_LIMIT
            )));
        }

        if self.timing.sample_period_ms == 0 || self.timing.sample_period_ms > 1000 {
            return Err(UplinkError::InvalidConfig(
                "sample_period_ms must be between 1 and 1000".to_string(),
            ));
        }

        if self.timing.diagnostic_period_s == 0 || self.timing.diagnostic_period_s > 3600 {
            return Err(UplinkError::InvalidConfig(
                "diagnostic_period_s must be between 1 and 3600".to_string(),
            ));
        }

        Ok(())
    }
}
