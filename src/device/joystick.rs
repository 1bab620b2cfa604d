//! # Evdev Joystick Module
//!
//! Joystick and gamepad discovery and state reading through the Linux evdev
//! interface.
//!
//! ## Device Detection
//!
//! Every `/dev/input/event*` node that reports an `ABS_X` axis together with
//! a joystick trigger (`BTN_TRIGGER`) or gamepad face button (`BTN_SOUTH`)
//! is treated as a joystick. Nodes are sorted by path so indices are stable
//! across runs with the same hardware plugged in.
//!
//! ## Reading
//!
//! State is read with the `EVIOCGABS`/`EVIOCGKEY` ioctls rather than by
//! draining the event queue, so a read never blocks the sampling loop.
//! Axes are rescaled to the joystick API range `-32767..=32767` using each
//! axis' reported min/max, and buttons are numbered in joydev order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use evdev::{AbsoluteAxisType, Device, Key};
use tracing::{debug, info};

use super::{DeviceSource, InputDevice, RawState, AXIS_MAX, AXIS_MIN, MAX_BUTTONS};
use crate::error::DeviceError;

/// Default directory scanned for event nodes
pub const INPUT_DIR: &str = "/dev/input";

/// First code of the joystick/gamepad button block (`BTN_JOYSTICK`)
const BTN_JOYSTICK_CODE: u16 = 0x120;

/// First code of the miscellaneous button block (`BTN_MISC`)
const BTN_MISC_CODE: u16 = 0x100;

/// Per-axis range as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisInfo {
    code: u16,
    minimum: i32,
    maximum: i32,
}

/// Joystick opened through evdev
pub struct JoystickDevice {
    device: Device,
    device_path: PathBuf,
    name: String,
    axes: Vec<AxisInfo>,
    buttons: Vec<Key>,
}

impl std::fmt::Debug for JoystickDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoystickDevice")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .field("axes", &self.axes.len())
            .field("buttons", &self.buttons.len())
            .finish_non_exhaustive()
    }
}

impl JoystickDevice {
    /// Wrap an opened evdev device, capturing its axis ranges and button map
    ///
    /// # Errors
    ///
    /// Returns `Read` if the axis ranges cannot be queried.
    pub fn from_device(device: Device, device_path: PathBuf) -> Result<Self, DeviceError> {
        let name = device
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| device_path.display().to_string());

        let abs_state = device.get_abs_state().map_err(|source| DeviceError::Read {
            name: name.clone(),
            source,
        })?;

        let axes = device
            .supported_absolute_axes()
            .map(|set| {
                set.iter()
                    .map(|axis| {
                        let info = &abs_state[axis.0 as usize];
                        AxisInfo {
                            code: axis.0,
                            minimum: info.minimum,
                            maximum: info.maximum,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let key_codes: Vec<u16> = device
            .supported_keys()
            .map(|set| set.iter().map(|key| key.code()).collect())
            .unwrap_or_default();
        let buttons = joydev_button_order(&key_codes)
            .into_iter()
            .map(Key::new)
            .collect();

        Ok(Self {
            device,
            device_path,
            name,
            axes,
            buttons,
        })
    }

    /// Event node this joystick was opened from
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }
}

impl InputDevice for JoystickDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn axis_count(&self) -> usize {
        self.axes.len()
    }

    fn button_count(&self) -> usize {
        self.buttons.len()
    }

    fn read(&mut self) -> Result<RawState, DeviceError> {
        let read_error = |source| DeviceError::Read {
            name: self.name.clone(),
            source,
        };

        let abs_state = self.device.get_abs_state().map_err(read_error)?;
        let key_state = self.device.get_key_state().map_err(read_error)?;

        let axes = self
            .axes
            .iter()
            .map(|axis| {
                let value = abs_state[axis.code as usize].value;
                scale_to_axis_range(value, axis.minimum, axis.maximum)
            })
            .collect();

        let buttons = self
            .buttons
            .iter()
            .enumerate()
            .filter(|(_, key)| key_state.contains(**key))
            .fold(0u32, |mask, (index, _)| mask | (1 << index));

        Ok(RawState { axes, buttons })
    }
}

impl Drop for JoystickDevice {
    fn drop(&mut self) {
        debug!("Closing joystick {} ({})", self.name, self.device_path.display());
    }
}

/// Joysticks under an input directory, opened by index
///
/// Event nodes are listed on the first [`open`](DeviceSource::open) and
/// examined one at a time as indices are requested, so creating a source
/// touches no devices and joysticks that are never asked for stay closed.
pub struct EvdevSource {
    input_dir: PathBuf,
    /// Event nodes not yet examined, in path order
    pending: Option<VecDeque<PathBuf>>,
    opened: usize,
}

impl Default for EvdevSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevSource {
    /// Source over `/dev/input`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_uplink::device::{acquire_devices, joystick::EvdevSource};
    ///
    /// let mut source = EvdevSource::new();
    /// let devices = acquire_devices(&mut source)?;
    /// println!("{} joystick(s)", devices.len());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_dir(INPUT_DIR)
    }

    /// Source over a specific directory of event nodes
    #[must_use]
    pub fn with_dir<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            pending: None,
            opened: 0,
        }
    }

    fn next_node(&mut self) -> Result<Option<PathBuf>, DeviceError> {
        if self.pending.is_none() {
            self.pending = Some(event_nodes(&self.input_dir)?.into());
        }
        Ok(self.pending.as_mut().and_then(VecDeque::pop_front))
    }
}

impl DeviceSource for EvdevSource {
    type Device = JoystickDevice;

    fn open(&mut self, index: usize) -> Result<JoystickDevice, DeviceError> {
        if index != self.opened {
            return Err(DeviceError::NotFound(index));
        }

        // Reported only if no joystick turns up after the failed node
        let mut open_error = None;

        while let Some(path) = self.next_node()? {
            match Device::open(&path) {
                Ok(device) if is_joystick(&device) => {
                    info!(
                        "Found joystick at {}: {}",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );
                    let joystick = JoystickDevice::from_device(device, path)?;
                    self.opened += 1;
                    return Ok(joystick);
                }
                Ok(_) => debug!("Skipping non-joystick input device {}", path.display()),
                Err(source) => {
                    debug!("Could not open {}: {}", path.display(), source);
                    open_error = Some(DeviceError::Open { path, source });
                }
            }
        }

        Err(open_error.unwrap_or(DeviceError::NotFound(index)))
    }
}

/// `event*` nodes under `input_dir`, sorted by path
fn event_nodes(input_dir: &Path) -> Result<Vec<PathBuf>, DeviceError> {
    let mut nodes = std::fs::read_dir(input_dir)
        .map_err(DeviceError::Enumerate)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(DeviceError::Enumerate)?;

    nodes.retain(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with("event"))
            .unwrap_or(false)
    });

    // Sorted for deterministic indices when multiple joysticks are connected
    nodes.sort();
    Ok(nodes)
}

fn is_joystick(device: &Device) -> bool {
    let has_stick = device
        .supported_absolute_axes()
        .map(|axes| axes.contains(AbsoluteAxisType::ABS_X))
        .unwrap_or(false);
    let has_buttons = device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_TRIGGER) || keys.contains(Key::BTN_SOUTH))
        .unwrap_or(false);
    has_stick && has_buttons
}

/// Button codes in joydev numbering: the joystick/gamepad block first, then
/// the misc block, capped at [`MAX_BUTTONS`].
fn joydev_button_order(codes: &[u16]) -> Vec<u16> {
    let mut sorted = codes.to_vec();
    sorted.sort_unstable();

    let joystick_block = sorted.iter().copied().filter(|&c| c >= BTN_JOYSTICK_CODE);
    let misc_block = sorted
        .iter()
        .copied()
        .filter(|&c| (BTN_MISC_CODE..BTN_JOYSTICK_CODE).contains(&c));

    joystick_block.chain(misc_block).take(MAX_BUTTONS).collect()
}

/// Rescale a raw evdev value from `minimum..=maximum` to `-32767..=32767`
fn scale_to_axis_range(value: i32, minimum: i32, maximum: i32) -> i32 {
    if maximum <= minimum {
        return 0;
    }
    let span = i64::from(maximum) - i64::from(minimum);
    let offset = i64::from(value.clamp(minimum, maximum)) - i64::from(minimum);
    let scaled = offset * 2 * i64::from(AXIS_MAX) / span + i64::from(AXIS_MIN);
    scaled as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_full_range_u8() {
        assert_eq!(scale_to_axis_range(0, 0, 255), -AXIS_MAX);
        assert_eq!(scale_to_axis_range(255, 0, 255), AXIS_MAX);
        // 128 is just past center on 0..=255 sticks
        assert!(scale_to_axis_range(128, 0, 255).abs() < 200);
    }

    #[test]
    fn test_scale_symmetric_range_is_identity() {
        assert_eq!(scale_to_axis_range(-32767, -32767, 32767), -32767);
        assert_eq!(scale_to_axis_range(0, -32767, 32767), 0);
        assert_eq!(scale_to_axis_range(32767, -32767, 32767), 32767);
    }

    #[test]
    fn test_scale_clamps_out_of_range() {
        assert_eq!(scale_to_axis_range(-10, 0, 255), -AXIS_MAX);
        assert_eq!(scale_to_axis_range(300, 0, 255), AXIS_MAX);
    }

    #[test]
    fn test_scale_degenerate_range() {
        assert_eq!(scale_to_axis_range(5, 0, 0), 0);
        assert_eq!(scale_to_axis_range(5, 10, 0), 0);
    }

    #[test]
    fn test_hat_axis_scales_to_extremes() {
        assert_eq!(scale_to_axis_range(-1, -1, 1), -AXIS_MAX);
        assert_eq!(scale_to_axis_range(0, -1, 1), 0);
        assert_eq!(scale_to_axis_range(1, -1, 1), AXIS_MAX);
    }

    #[test]
    fn test_joydev_button_order() {
        // BTN_0 (0x100), BTN_SOUTH (0x130), BTN_EAST (0x131), BTN_TRIGGER (0x120), KEY_A (0x1e)
        let order = joydev_button_order(&[0x130, 0x100, 0x1e, 0x131, 0x120]);
        assert_eq!(order, vec![0x120, 0x130, 0x131, 0x100]);
    }

    #[test]
    fn test_joydev_button_order_caps_count() {
        let codes: Vec<u16> = (0x100..0x100 + 40).collect();
        assert_eq!(joydev_button_order(&codes).len(), MAX_BUTTONS);
    }

    #[test]
    fn test_missing_dir_fails_on_first_open() {
        let mut source = EvdevSource::with_dir("/nonexistent/input/dir");
        assert!(matches!(source.open(0), Err(DeviceError::Enumerate(_))));
    }

    #[test]
    fn test_dir_without_event_nodes_has_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("js0"), b"").unwrap();
        std::fs::write(dir.path().join("mouse0"), b"").unwrap();

        let mut source = EvdevSource::with_dir(dir.path());
        assert!(matches!(source.open(0), Err(DeviceError::NotFound(0))));
    }

    #[test]
    fn test_event_nodes_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["event1", "js0", "event0", "mice"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let nodes = event_nodes(dir.path()).unwrap();
        assert_eq!(
            nodes,
            vec![dir.path().join("event0"), dir.path().join("event1")]
        );
    }

    #[test]
    fn test_unopenable_node_reports_open_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("event0"), b"not a device").unwrap();

        let mut source = EvdevSource::with_dir(dir.path());
        match source.open(0) {
            Err(DeviceError::Open { path, .. }) => assert_eq!(path, dir.path().join("event0")),
            other => panic!("Expected Open error, got: {:?}", other),
        }
        // The node was consumed; nothing is left to try
        assert!(matches!(source.open(0), Err(DeviceError::NotFound(0))));
    }

    #[test]
    fn test_indices_must_be_requested_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = EvdevSource::with_dir(dir.path());
        assert!(matches!(source.open(1), Err(DeviceError::NotFound(1))));
        // Nothing was listed for an out-of-order request
        assert!(source.pending.is_none());
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        let mut source = EvdevSource::new();
        let mut joystick = source.open(0).expect("No joystick connected");

        assert!(joystick.device_path().starts_with(INPUT_DIR));
        let state = joystick.read().expect("Failed to read joystick");
        assert_eq!(state.axes.len(), joystick.axis_count());
    }
}
