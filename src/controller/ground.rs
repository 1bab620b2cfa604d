//! # Ground Vehicle Controller
//!
//! Maps joystick state onto [`GroundState`] commands.
//!
//! | Command | Input | Shaping |
//! |---------|-------|---------|
//! | `steer` | `[steering]` axis | deadzone, expo, invert, then trim |
//! | `esc` | `[esc]` axis | deadzone, expo, invert |
//! | `gear` | `[gear]` up/down buttons | one step per press, -1 (reverse) to `max_gear` |

use tracing::debug;

use super::curve::AxisCurve;
use super::Controller;
use crate::config::{AxisBinding, GearBinding, Profile, SessionConfig};
use crate::device::{InputDevice, RawState, MAX_BUTTONS};
use crate::error::{DeviceError, Result, UplinkError};
use crate::packet::protocol::{CommandState, GroundState, COMMAND_MAX, GEAR_NEUTRAL, GEAR_REVERSE};

/// An axis on a specific device with its shaping
#[derive(Debug, Clone, Copy)]
struct AxisInput {
    device: usize,
    axis: usize,
    curve: AxisCurve,
}

impl AxisInput {
    fn command(&self, readings: &[RawState]) -> i32 {
        readings[self.device]
            .axis(self.axis)
            .map(|raw| self.curve.command(raw))
            .unwrap_or(0)
    }
}

/// Edge-triggered gear selector
///
/// Holding a button shifts once; it must be released before it shifts again.
#[derive(Debug, Clone)]
pub struct GearShifter {
    max_gear: i8,
    gear: i8,
    up_held: bool,
    down_held: bool,
}

impl GearShifter {
    /// Starts in neutral
    #[must_use]
    pub fn new(max_gear: i8) -> Self {
        Self {
            max_gear,
            gear: GEAR_NEUTRAL,
            up_held: false,
            down_held: false,
        }
    }

    #[must_use]
    pub fn gear(&self) -> i8 {
        self.gear
    }

    /// Feed current button states; returns the selected gear
    pub fn update(&mut self, up: bool, down: bool) -> i8 {
        if up && !self.up_held {
            self.gear = (self.gear + 1).min(self.max_gear);
        }
        if down && !self.down_held {
            self.gear = (self.gear - 1).max(GEAR_REVERSE);
        }
        self.up_held = up;
        self.down_held = down;
        self.gear
    }
}

/// Controller for wheeled vehicles (steering + ESC + gearbox)
pub struct GroundController<D> {
    devices: Vec<D>,
    steering: AxisInput,
    esc: AxisInput,
    gear_device: usize,
    gear_up: usize,
    gear_down: usize,
    shifter: GearShifter,
    trim_steering: i32,
}

impl<D: InputDevice> std::fmt::Debug for GroundController<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundController")
            .field("devices", &self.devices.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("steering", &self.steering)
            .field("esc", &self.esc)
            .field("gear", &self.shifter.gear())
            .field("trim_steering", &self.trim_steering)
            .finish()
    }
}

impl<D: InputDevice> GroundController<D> {
    /// Bind a profile to the opened devices
    ///
    /// Session inversion flags flip the profile's own `invert` settings.
    ///
    /// # Errors
    ///
    /// Returns [`UplinkError::Profile`] if a binding names a device, axis or
    /// button that does not exist, or [`UplinkError::InvalidConfig`] if the
    /// steering trim is outside `-1000..=1000`.
    pub fn new(devices: Vec<D>, profile: &Profile, session: &SessionConfig) -> Result<Self> {
        if !(-COMMAND_MAX..=COMMAND_MAX).contains(&session.trim_steering) {
            return Err(UplinkError::InvalidConfig(format!(
                "trim_steering {} is outside {}..={}",
                session.trim_steering, -COMMAND_MAX, COMMAND_MAX
            )));
        }

        let steering = bind_axis("steering", &profile.steering, &devices, session.invert_steering)?;
        let esc = bind_axis("esc", &profile.esc, &devices, session.invert_esc)?;
        check_gear_binding(&profile.gear, &devices)?;

        debug!(
            "Bound steering to device {} axis {}, esc to device {} axis {}",
            steering.device, steering.axis, esc.device, esc.axis
        );

        Ok(Self {
            devices,
            steering,
            esc,
            gear_device: profile.gear.device,
            gear_up: profile.gear.up_button,
            gear_down: profile.gear.down_button,
            shifter: GearShifter::new(profile.gear.max_gear),
            trim_steering: session.trim_steering,
        })
    }

    pub fn devices(&self) -> &[D] {
        &self.devices
    }
}

impl<D: InputDevice> Controller for GroundController<D> {
    fn updated_state(&mut self) -> std::result::Result<CommandState, DeviceError> {
        let readings = self
            .devices
            .iter_mut()
            .map(|device| device.read())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let steer = self
            .steering
            .command(&readings)
            .saturating_add(self.trim_steering)
            .clamp(-COMMAND_MAX, COMMAND_MAX);
        let esc = self.esc.command(&readings);

        let buttons = &readings[self.gear_device];
        let gear = self
            .shifter
            .update(buttons.button(self.gear_up), buttons.button(self.gear_down));

        Ok(CommandState::Ground(GroundState { steer, esc, gear }))
    }
}

fn bind_axis<D: InputDevice>(
    name: &str,
    binding: &AxisBinding,
    devices: &[D],
    flip: bool,
) -> Result<AxisInput> {
    let device = devices.get(binding.device).ok_or_else(|| {
        UplinkError::Profile(format!(
            "{} uses device {} but only {} opened",
            name,
            binding.device,
            devices.len()
        ))
    })?;

    if binding.axis >= device.axis_count() {
        return Err(UplinkError::Profile(format!(
            "{} uses axis {} but {} has {} axes",
            name,
            binding.axis,
            device.name(),
            device.axis_count()
        )));
    }

    Ok(AxisInput {
        device: binding.device,
        axis: binding.axis,
        curve: AxisCurve::from_binding(binding, flip),
    })
}

fn check_gear_binding<D: InputDevice>(binding: &GearBinding, devices: &[D]) -> Result<()> {
    let device = devices.get(binding.device).ok_or_else(|| {
        UplinkError::Profile(format!(
            "gear uses device {} but only {} opened",
            binding.device,
            devices.len()
        ))
    })?;

    let available = device.button_count().min(MAX_BUTTONS);
    for button in [binding.up_button, binding.down_button] {
        if button >= available {
            return Err(UplinkError::Profile(format!(
                "gear uses button {} but {} has {} buttons",
                button,
                device.name(),
                available
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mocks::FakeDevice;
    use crate::device::AXIS_MAX;

    fn pad() -> FakeDevice {
        FakeDevice::new("pad", 4, 12)
    }

    fn reading(axes: [i32; 4], buttons: u32) -> RawState {
        RawState {
            axes: axes.to_vec(),
            buttons,
        }
    }

    fn linear_profile() -> Profile {
        let mut profile = Profile::default();
        profile.steering.deadzone = 0.0;
        profile.esc.deadzone = 0.0;
        profile.esc.expo = 0.0;
        profile.esc.invert = false;
        profile
    }

    fn ground(state: CommandState) -> GroundState {
        match state {
            CommandState::Ground(g) => g,
        }
    }

    // ==================== GearShifter Tests ====================

    #[test]
    fn test_gear_starts_neutral() {
        assert_eq!(GearShifter::new(3).gear(), GEAR_NEUTRAL);
    }

    #[test]
    fn test_gear_shifts_once_per_press() {
        let mut shifter = GearShifter::new(3);
        assert_eq!(shifter.update(true, false), 1);
        assert_eq!(shifter.update(true, false), 1); // still held
        assert_eq!(shifter.update(false, false), 1);
        assert_eq!(shifter.update(true, false), 2);
    }

    #[test]
    fn test_gear_clamps_to_range() {
        let mut shifter = GearShifter::new(1);
        shifter.update(true, false);
        shifter.update(false, false);
        assert_eq!(shifter.update(true, false), 1);

        for _ in 0..5 {
            shifter.update(false, true);
            shifter.update(false, false);
        }
        assert_eq!(shifter.gear(), GEAR_REVERSE);
    }

    // ==================== Binding Tests ====================

    #[test]
    fn test_missing_device_is_profile_error() {
        let mut profile = Profile::default();
        profile.esc.device = 1;
        let err = GroundController::new(vec![pad()], &profile, &SessionConfig::default()).unwrap_err();
        assert!(matches!(err, UplinkError::Profile(msg) if msg.contains("esc")));
    }

    #[test]
    fn test_missing_axis_is_profile_error() {
        let mut profile = Profile::default();
        profile.steering.axis = 4;
        let err = GroundController::new(vec![pad()], &profile, &SessionConfig::default()).unwrap_err();
        assert!(matches!(err, UplinkError::Profile(msg) if msg.contains("axis 4")));
    }

    #[test]
    fn test_missing_button_is_profile_error() {
        let device = FakeDevice::new("stick", 4, 3);
        let err = GroundController::new(vec![device], &Profile::default(), &SessionConfig::default())
            .unwrap_err();
        assert!(matches!(err, UplinkError::Profile(msg) if msg.contains("button 5")));
    }

    // ==================== Mapping Tests ====================

    #[test]
    fn test_centered_sticks_are_neutral() {
        let mut controller =
            GroundController::new(vec![pad()], &Profile::default(), &SessionConfig::default()).unwrap();
        let state = ground(controller.updated_state().unwrap());
        assert_eq!(state, GroundState::default());
    }

    #[test]
    fn test_default_esc_forward_is_stick_up() {
        let device = pad().with_readings(vec![reading([0, -AXIS_MAX, 0, 0], 0)]);
        let mut controller =
            GroundController::new(vec![device], &Profile::default(), &SessionConfig::default()).unwrap();
        assert_eq!(ground(controller.updated_state().unwrap()).esc, COMMAND_MAX);
    }

    #[test]
    fn test_session_flags_invert() {
        let device = pad().with_readings(vec![reading([AXIS_MAX, AXIS_MAX, 0, 0], 0)]);
        let session = SessionConfig {
            invert_steering: true,
            invert_esc: true,
            ..SessionConfig::default()
        };
        let mut controller = GroundController::new(vec![device], &linear_profile(), &session).unwrap();
        let state = ground(controller.updated_state().unwrap());
        assert_eq!(state.steer, -COMMAND_MAX);
        assert_eq!(state.esc, -COMMAND_MAX);
    }

    #[test]
    fn test_out_of_range_trim_is_rejected() {
        for trim in [COMMAND_MAX + 1, -COMMAND_MAX - 1, i32::MAX, i32::MIN] {
            let session = SessionConfig {
                trim_steering: trim,
                ..SessionConfig::default()
            };
            let err = GroundController::new(vec![pad()], &Profile::default(), &session).unwrap_err();
            assert!(matches!(err, UplinkError::InvalidConfig(msg) if msg.contains("trim_steering")));
        }
    }

    #[test]
    fn test_full_trim_at_full_deflection_saturates() {
        let device = pad().with_readings(vec![reading([AXIS_MAX, 0, 0, 0], 0)]);
        let session = SessionConfig {
            trim_steering: COMMAND_MAX,
            ..SessionConfig::default()
        };
        let mut controller = GroundController::new(vec![device], &linear_profile(), &session).unwrap();
        assert_eq!(ground(controller.updated_state().unwrap()).steer, COMMAND_MAX);
    }

    #[test]
    fn test_trim_offsets_and_clamps_steering() {
        let device = pad().with_readings(vec![
            reading([0, 0, 0, 0], 0),
            reading([AXIS_MAX, 0, 0, 0], 0),
        ]);
        let session = SessionConfig {
            trim_steering: 40,
            ..SessionConfig::default()
        };
        let mut controller = GroundController::new(vec![device], &linear_profile(), &session).unwrap();
        assert_eq!(ground(controller.updated_state().unwrap()).steer, 40);
        assert_eq!(ground(controller.updated_state().unwrap()).steer, COMMAND_MAX);
    }

    #[test]
    fn test_axes_from_second_device() {
        let first = pad();
        let second = FakeDevice::new("wheel", 3, 8).with_readings(vec![RawState {
            axes: vec![AXIS_MAX / 2, 0, 0],
            buttons: 0,
        }]);
        let mut profile = linear_profile();
        profile.steering.device = 1;
        let mut controller =
            GroundController::new(vec![first, second], &profile, &SessionConfig::default()).unwrap();
        assert_eq!(controller.devices().len(), 2);
        assert_eq!(ground(controller.updated_state().unwrap()).steer, 500);
    }

    #[test]
    fn test_gear_buttons_drive_gear() {
        let up = 1 << 5;
        let down = 1 << 4;
        let device = pad().with_readings(vec![
            reading([0; 4], up),
            reading([0; 4], 0),
            reading([0; 4], up),
            reading([0; 4], down),
        ]);
        let mut controller =
            GroundController::new(vec![device], &Profile::default(), &SessionConfig::default()).unwrap();
        let gears: Vec<i8> = (0..4)
            .map(|_| ground(controller.updated_state().unwrap()).gear)
            .collect();
        assert_eq!(gears, vec![1, 1, 2, 1]);
    }

    #[test]
    fn test_device_failure_surfaces() {
        let device = pad().then_fail(std::io::ErrorKind::NotConnected);
        let mut controller =
            GroundController::new(vec![device], &Profile::default(), &SessionConfig::default()).unwrap();
        let err = controller.updated_state().unwrap_err();
        assert!(matches!(err, DeviceError::Read { name, .. } if name == "pad"));
    }
}
