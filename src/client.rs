//! # Client Module
//!
//! Acquires the session's resources in order and hands them to the
//! sampling loop.
//!
//! This module handles:
//! - Opening the UDP transport, then the input devices, then building the
//!   controller from the profile
//! - Running the [`SamplingLoop`] until cancellation or a fatal error
//! - Device diagnostics (`--show-devices`) without sending anything
//!
//! A failure at any acquisition step releases whatever was already acquired,
//! in reverse order, before the error is returned.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::config::{Profile, SessionConfig};
use crate::controller::GroundController;
use crate::device::{acquire_devices, DeviceSource, InputDevice};
use crate::error::Result;
use crate::sampling::{DiagnosticSink, LoopTiming, SamplingLoop, TracingSink};
use crate::shutdown::{CancelSignal, StopReason};
use crate::transport::UdpTransport;

/// How often [`show_device_stats`] prints raw device state
pub const DEVICE_STATS_PERIOD: Duration = Duration::from_secs(1);

/// A configured remote-control session
#[derive(Debug, Clone)]
pub struct Client {
    config: SessionConfig,
}

impl Client {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        info!("Server Address: {}", config.address);
        info!("   Config Path: {}", config.cfg_path.display());
        info!("    Invert ESC: {}", config.invert_esc);
        info!("Invert Steering: {}", config.invert_steering);
        info!(" Steering Trim: {}", config.trim_steering);
        info!("         Codec: {}", config.codec);
        Self { config }
    }

    /// Run the session, logging diagnostics through `tracing`
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub async fn run<S>(&self, source: S, cancel: CancelSignal) -> Result<StopReason>
    where
        S: DeviceSource,
    {
        self.run_with(source, TracingSink, cancel).await
    }

    /// Acquire transport, devices and controller, then sample until stopped
    ///
    /// # Arguments
    ///
    /// * `source` - Where input devices are opened from
    /// * `sink` - Receives the periodic diagnostic reports
    /// * `cancel` - Ends the session; its reason is returned
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the session settings are out of range; nothing
    ///   is acquired in that case
    /// - `Transport` if the receiver address cannot be resolved or bound
    /// - `NoDevicesFound` if no input device can be opened
    /// - `Io`, `Config`, `InvalidConfig` or `Profile` if the profile cannot
    ///   be loaded or does not fit the devices
    /// - Any fatal sampling error (`ControllerRead`, `Encode`, `Send`)
    pub async fn run_with<S, K>(
        &self,
        mut source: S,
        sink: K,
        cancel: CancelSignal,
    ) -> Result<StopReason>
    where
        S: DeviceSource,
        K: DiagnosticSink,
    {
        info!("starting client...");
        let result = self.session(&mut source, sink, cancel).await;
        info!("client stopped");
        result
    }

    async fn session<S, K>(
        &self,
        source: &mut S,
        sink: K,
        cancel: CancelSignal,
    ) -> Result<StopReason>
    where
        S: DeviceSource,
        K: DiagnosticSink,
    {
        self.config.validate()?;

        let transport = UdpTransport::connect(&self.config.address).await?;
        let devices = acquire_devices(source)?;

        let profile = Profile::load(&self.config.cfg_path)?;
        let controller = GroundController::new(devices, &profile, &self.config)?;
        let timing = LoopTiming::from(&profile.timing);

        info!(
            "start sending to {} every {:?}",
            transport.remote_addr(),
            timing.sample_period
        );
        let codec = self.config.codec.build();
        let result = SamplingLoop::new(controller, codec, transport, sink, timing)
            .run(cancel)
            .await;
        info!("sending stopped");
        result
    }
}

/// Print every device's raw state once per period until cancelled
///
/// # Errors
///
/// Returns `NoDevicesFound` if nothing can be opened, or `Device` when a
/// device stops answering.
pub async fn show_device_stats<S: DeviceSource>(
    mut source: S,
    period: Duration,
    mut cancel: CancelSignal,
) -> Result<StopReason> {
    let mut devices = acquire_devices(&mut source)?;

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            reason = cancel.cancelled() => return Ok(reason),

            _ = ticker.tick() => {
                for (index, device) in devices.iter_mut().enumerate() {
                    let state = device.read()?;
                    info!("Joystick {} ({}):", index, device.name());
                    info!("  Buttons: {:032b}", state.buttons);
                    for (axis, value) in state.axes.iter().enumerate() {
                        info!("  Axis {}: {}", axis, value);
                    }
                }
            }
        }
    }
}
