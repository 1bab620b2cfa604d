//! # Device Module
//!
//! Input device discovery and raw state reading.
//!
//! Devices are opened by index, starting at 0, until one fails to open or
//! [`MAX_DEVICES`] are open. Failing at index 0 means there is nothing to
//! drive with; failing later just ends the scan.

pub mod joystick;

use tracing::info;

use crate::error::{DeviceError, Result, UplinkError};

/// Upper bound on devices opened at startup
pub const MAX_DEVICES: usize = 10;

/// Axis value for full deflection, matching the Linux joystick API range
pub const AXIS_MAX: i32 = 32767;

/// Axis value for full negative deflection
pub const AXIS_MIN: i32 = -AXIS_MAX;

/// Buttons beyond this index are not reported
pub const MAX_BUTTONS: usize = 32;

/// Snapshot of one device's inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawState {
    /// Axis positions, each in `AXIS_MIN..=AXIS_MAX`
    pub axes: Vec<i32>,
    /// Button bitmask, bit `n` set while button `n` is held
    pub buttons: u32,
}

impl RawState {
    /// Whether button `index` is held
    #[must_use]
    pub fn button(&self, index: usize) -> bool {
        index < MAX_BUTTONS && self.buttons & (1 << index) != 0
    }

    /// Axis position, if the axis exists
    #[must_use]
    pub fn axis(&self, index: usize) -> Option<i32> {
        self.axes.get(index).copied()
    }
}

/// An opened joystick or gamepad
///
/// Dropping the value closes the device.
pub trait InputDevice {
    fn name(&self) -> &str;

    fn axis_count(&self) -> usize;

    fn button_count(&self) -> usize;

    /// Read the current state without waiting for new events
    fn read(&mut self) -> std::result::Result<RawState, DeviceError>;
}

impl<T: InputDevice + ?Sized> InputDevice for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn axis_count(&self) -> usize {
        (**self).axis_count()
    }

    fn button_count(&self) -> usize {
        (**self).button_count()
    }

    fn read(&mut self) -> std::result::Result<RawState, DeviceError> {
        (**self).read()
    }
}

/// Opens input devices by index
///
/// Indices are requested in order, starting at 0.
pub trait DeviceSource {
    type Device: InputDevice;

    /// Open the device at `index`
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] when there is no device at that index, or
    /// the error that kept it from opening.
    fn open(&mut self, index: usize) -> std::result::Result<Self::Device, DeviceError>;
}

impl<S: DeviceSource + ?Sized> DeviceSource for &mut S {
    type Device = S::Device;

    fn open(&mut self, index: usize) -> std::result::Result<S::Device, DeviceError> {
        (**self).open(index)
    }
}

/// Open every available device
///
/// # Errors
///
/// Returns [`UplinkError::NoDevicesFound`] if the device at index 0 cannot be
/// opened. Later failures end the scan without error.
pub fn acquire_devices<S: DeviceSource>(source: &mut S) -> Result<Vec<S::Device>> {
    let mut devices = Vec::new();

    for index in 0..MAX_DEVICES {
        match source.open(index) {
            Ok(device) => {
                info!("Joystick Name: {}", device.name());
                info!("   Axis Count: {}", device.axis_count());
                info!(" Button Count: {}", device.button_count());
                devices.push(device);
            }
            Err(e) if index == 0 => return Err(UplinkError::NoDevicesFound(e)),
            Err(_) => break,
        }
    }

    Ok(devices)
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::transport::channel::mocks::ReleaseLog;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted input device
    ///
    /// Returns queued readings in order, then repeats the last one. A queued
    /// `Err` simulates an unplugged device.
    #[derive(Debug)]
    pub struct FakeDevice {
        pub name: String,
        pub axis_count: usize,
        pub button_count: usize,
        readings: VecDeque<std::result::Result<RawState, std::io::ErrorKind>>,
        last: RawState,
        released: Arc<AtomicUsize>,
        release_log: Option<ReleaseLog>,
    }

    impl FakeDevice {
        pub fn new(name: &str, axis_count: usize, button_count: usize) -> Self {
            Self {
                name: name.to_string(),
                axis_count,
                button_count,
                readings: VecDeque::new(),
                last: RawState {
                    axes: vec![0; axis_count],
                    buttons: 0,
                },
                released: Arc::new(AtomicUsize::new(0)),
                release_log: None,
            }
        }

        pub fn with_readings(mut self, readings: Vec<RawState>) -> Self {
            self.readings.extend(readings.into_iter().map(Ok));
            self
        }

        pub fn then_fail(mut self, kind: std::io::ErrorKind) -> Self {
            self.readings.push_back(Err(kind));
            self
        }

        pub fn with_release_log(mut self, log: ReleaseLog) -> Self {
            self.release_log = Some(log);
            self
        }

        /// Counter bumped when this device is dropped
        pub fn release_counter(&self) -> Arc<AtomicUsize> {
            self.released.clone()
        }
    }

    impl InputDevice for FakeDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn axis_count(&self) -> usize {
            self.axis_count
        }

        fn button_count(&self) -> usize {
            self.button_count
        }

        fn read(&mut self) -> std::result::Result<RawState, DeviceError> {
            match self.readings.pop_front() {
                Some(Ok(state)) => {
                    self.last = state.clone();
                    Ok(state)
                }
                Some(Err(kind)) => Err(DeviceError::Read {
                    name: self.name.clone(),
                    source: std::io::Error::from(kind),
                }),
                None => Ok(self.last.clone()),
            }
        }
    }

    impl Drop for FakeDevice {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = &self.release_log {
                log.lock().unwrap().push(format!("device:{}", self.name));
            }
        }
    }

    /// Hands out pre-built devices by index
    #[derive(Debug, Default)]
    pub struct FakeSource {
        devices: VecDeque<FakeDevice>,
        pub attempts: Vec<usize>,
    }

    impl FakeSource {
        pub fn new(devices: Vec<FakeDevice>) -> Self {
            Self {
                devices: devices.into(),
                attempts: Vec::new(),
            }
        }
    }

    impl DeviceSource for FakeSource {
        type Device = FakeDevice;

        fn open(&mut self, index: usize) -> std::result::Result<FakeDevice, DeviceError> {
            self.attempts.push(index);
            self.devices.pop_front().ok_or(DeviceError::NotFound(index))
        }
    }
}
