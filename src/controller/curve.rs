//! # Axis Curve Module
//!
//! Shapes one analog axis into a command value.
//!
//! ## Deadzone
//!
//! Small deflections near center are mapped to 0 so a worn stick does not
//! creep the vehicle. Outside the deadzone the remaining travel is rescaled
//! so full deflection still reaches 1.0.
//!
//! ## Expo
//!
//! `output = (1 - expo) * input + expo * input³` softens the response
//! around center while keeping the endpoints.
//!
//! ## Usage
//!
//! ```
//! use rc_uplink::controller::curve::AxisCurve;
//!
//! let curve = AxisCurve::new(0.05, 0.3, false);
//!
//! assert_eq!(curve.apply(0.02), 0.0);
//! assert!((curve.apply(1.0) - 1.0).abs() < 0.001);
//! ```

use crate::config::AxisBinding;
use crate::device::AXIS_MAX;
use crate::packet::protocol::COMMAND_MAX;

/// Deadzone, expo and direction for one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCurve {
    /// Fraction of travel ignored around center (0.0 to 0.25)
    deadzone: f32,
    /// Cubic blend factor (0.0 to 1.0)
    expo: f32,
    invert: bool,
}

impl Default for AxisCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl AxisCurve {
    /// Values outside the valid ranges are clamped.
    #[must_use]
    pub fn new(deadzone: f32, expo: f32, invert: bool) -> Self {
        Self {
            deadzone: deadzone.clamp(0.0, 0.25),
            expo: expo.clamp(0.0, 1.0),
            invert,
        }
    }

    /// Straight pass-through
    #[must_use]
    pub fn linear() -> Self {
        Self {
            deadzone: 0.0,
            expo: 0.0,
            invert: false,
        }
    }

    /// Curve for a profile binding; `flip` toggles the profile's direction
    #[must_use]
    pub fn from_binding(binding: &AxisBinding, flip: bool) -> Self {
        Self::new(binding.deadzone, binding.expo, binding.invert ^ flip)
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Shape a normalized input (-1.0 to 1.0)
    #[must_use]
    pub fn apply(&self, input: f32) -> f32 {
        let input = input.clamp(-1.0, 1.0);
        let shaped = input.signum() * self.expo_curve(self.cut_deadzone(input.abs()));
        if self.invert {
            -shaped
        } else {
            shaped
        }
    }

    /// Raw joystick value straight to a per-mille command
    #[must_use]
    pub fn command(&self, raw: i32) -> i32 {
        to_command(self.apply(normalize_axis(raw)))
    }

    #[inline]
    fn cut_deadzone(&self, magnitude: f32) -> f32 {
        if magnitude <= self.deadzone {
            0.0
        } else {
            (magnitude - self.deadzone) / (1.0 - self.deadzone)
        }
    }

    #[inline]
    fn expo_curve(&self, x: f32) -> f32 {
        if self.expo == 0.0 {
            x
        } else {
            (1.0 - self.expo) * x + self.expo * x * x * x
        }
    }
}

/// Joystick range (`-32767..=32767`) to -1.0..=1.0
///
/// ```
/// use rc_uplink::controller::curve::normalize_axis;
///
/// assert_eq!(normalize_axis(0), 0.0);
/// assert_eq!(normalize_axis(32767), 1.0);
/// assert_eq!(normalize_axis(-32768), -1.0);
/// ```
#[must_use]
pub fn normalize_axis(raw: i32) -> f32 {
    (raw as f32 / AXIS_MAX as f32).clamp(-1.0, 1.0)
}

/// -1.0..=1.0 to a per-mille command, rounded
#[must_use]
pub fn to_command(value: f32) -> i32 {
    let scaled = (value.clamp(-1.0, 1.0) * COMMAND_MAX as f32).round() as i32;
    scaled.clamp(-COMMAND_MAX, COMMAND_MAX)
}
