//! # RC Uplink
//!
//! Drive an RC ground vehicle from a gamepad over UDP.
//!
//! This application samples the connected joysticks every few milliseconds
//! and sends steering, ESC and gear commands to the receiver on the vehicle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rc_uplink::client::{show_device_stats, Client, DEVICE_STATS_PERIOD};
use rc_uplink::config::{self, SessionConfig};
use rc_uplink::device::joystick::EvdevSource;
use rc_uplink::packet::codec::CodecKind;
use rc_uplink::shutdown::{self, CancelHandle, StopReason};

/// Gamepad remote control over UDP
#[derive(Parser, Debug)]
#[command(name = "rc-uplink", version, about, long_about = None)]
struct Cli {
    /// Receiver address (host:port)
    #[arg(long, default_value_t = config::default_address())]
    address: String,

    /// Control profile (TOML)
    #[arg(long, default_value = config::default_cfg_path())]
    cfg: PathBuf,

    /// Reverse the throttle direction
    #[arg(long)]
    invert_esc: bool,

    /// Reverse the steering direction
    #[arg(long)]
    invert_steering: bool,

    /// Steering offset in per-mille (-1000 to 1000)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    trim_steering: i32,

    /// Wire encoding; the receiver must match
    #[arg(long, value_enum, default_value_t = CodecKind::Bincode)]
    codec: CodecKind,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print raw joystick state once a second instead of driving
    #[arg(long)]
    show_devices: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            address: self.address.clone(),
            cfg_path: self.cfg.clone(),
            invert_esc: self.invert_esc,
            invert_steering: self.invert_steering,
            trim_steering: self.trim_steering,
            codec: self.codec,
        }
    }
}

/// Main entry point for RC Uplink
///
/// # Control Flow
///
/// 1. Parse arguments and set up logging
/// 2. Arm Ctrl+C and the optional `--duration` deadline on one cancel handle
/// 3. Run the client (or the device inspector) until cancelled or failed
///
/// A cancelled run exits 0; any error is logged and exits non-zero.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_deref())?;

    info!("RC Uplink v{} starting...", env!("CARGO_PKG_VERSION"));

    let (handle, cancel) = shutdown::channel();
    spawn_ctrl_c(handle.clone());
    if let Some(secs) = cli.duration {
        spawn_deadline(handle, Duration::from_secs(secs));
    }

    let result = if cli.show_devices {
        show_device_stats(EvdevSource::new(), DEVICE_STATS_PERIOD, cancel).await
    } else {
        let session = cli.session_config();
        session.validate()?;
        Client::new(session).run(EvdevSource::new(), cancel).await
    };

    match result {
        Ok(reason) => {
            info!("Shutting down: {}", reason);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}

/// Console logging, plus a rolling file when `log_dir` is set
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "rc-uplink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn spawn_ctrl_c(handle: CancelHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping...");
                handle.cancel(StopReason::Interrupted);
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });
}

fn spawn_deadline(handle: CancelHandle, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        handle.cancel(StopReason::DeadlineExceeded);
    });
}
