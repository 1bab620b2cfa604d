//! # Sampling Loop
//!
//! Fixed-rate read → encode → send cycle.
//!
//! One task waits on three events per iteration, checked in this order:
//!
//! 1. **Cancellation** - return the stop reason, nothing else is sent
//! 2. **Diagnostic tick** (default 5 s) - report the last sent packet
//! 3. **Sampling tick** (default 4 ms) - read the controller, stamp,
//!    encode and send one datagram
//!
//! Exactly one branch runs per iteration and it runs to completion, so
//! sends happen in tick order and never overlap. A slow controller read
//! delays the next tick; missed ticks are skipped, not bunched.
//!
//! Each packet is stamped with the current wall-clock time. If the clock
//! stands still or is stepped back, the stamp is nudged one microsecond
//! past the previous packet so timestamps always increase in tick order.
//!
//! Controller, encode and send failures end the loop. Nothing is queued or
//! retried: the link is fire-and-forget, and those errors are local faults
//! that another tick would not fix.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::config::TimingConfig;
use crate::controller::Controller;
use crate::error::{Result, UplinkError};
use crate::packet::codec::PacketCodec;
use crate::packet::protocol::Packet;
use crate::shutdown::{CancelSignal, StopReason};
use crate::transport::Transport;

/// Default sampling period (250 Hz)
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(4);

/// Default diagnostic period
pub const DEFAULT_DIAGNOSTIC_PERIOD: Duration = Duration::from_secs(5);

/// Loop cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub sample_period: Duration,
    pub diagnostic_period: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            sample_period: DEFAULT_SAMPLE_PERIOD,
            diagnostic_period: DEFAULT_DIAGNOSTIC_PERIOD,
        }
    }
}

impl From<&TimingConfig> for LoopTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            sample_period: config.sample_period(),
            diagnostic_period: config.diagnostic_period(),
        }
    }
}

/// What the loop reports on each diagnostic tick
#[derive(Debug, Clone, Copy)]
pub struct Diagnostic<'a> {
    /// Datagrams written since the loop started
    pub packets_sent: u64,
    /// Newest packet that was successfully sent, if any
    pub last_sent: Option<&'a Packet>,
}

/// Receives periodic liveness reports from the loop
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic<'_>);
}

impl<F: FnMut(&Diagnostic<'_>)> DiagnosticSink for F {
    fn report(&mut self, diagnostic: &Diagnostic<'_>) {
        self(diagnostic)
    }
}

/// Logs reports at `info` level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: &Diagnostic<'_>) {
        match diagnostic.last_sent {
            Some(packet) => info!(
                "ticker log - {} packets sent, latest {} state: {:?} (at {})",
                diagnostic.packets_sent, packet.state_type, packet.state, packet.sent_at
            ),
            None => info!("ticker log - no packet sent yet"),
        }
    }
}

/// Smallest step between consecutive packet timestamps, in microseconds
pub const MIN_STAMP_STEP_US: i64 = 1;

/// Source of packet timestamps
pub trait WallClock {
    fn now(&self) -> DateTime<Utc>;
}

impl<F: Fn() -> DateTime<Utc>> WallClock for F {
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// The system clock, read on every tick
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The sampling loop and everything it exclusively owns
///
/// [`run`](Self::run) consumes the loop, so the controller (with its
/// devices) and the transport are released exactly once however it ends.
pub struct SamplingLoop<C, K, T, S, W = SystemClock> {
    // Fields drop in declaration order: controller and devices before the
    // transport, the reverse of how they were acquired.
    controller: C,
    transport: T,
    codec: K,
    sink: S,
    clock: W,
    timing: LoopTiming,
    last_sent: Option<Packet>,
    packets_sent: u64,
}

impl<C, K, T, S> SamplingLoop<C, K, T, S>
where
    C: Controller,
    K: PacketCodec,
    T: Transport,
    S: DiagnosticSink,
{
    /// Loop stamping packets with the system clock
    pub fn new(controller: C, codec: K, transport: T, sink: S, timing: LoopTiming) -> Self {
        Self {
            controller,
            transport,
            codec,
            sink,
            clock: SystemClock,
            timing,
            last_sent: None,
            packets_sent: 0,
        }
    }
}

impl<C, K, T, S, W> SamplingLoop<C, K, T, S, W>
where
    C: Controller,
    K: PacketCodec,
    T: Transport,
    S: DiagnosticSink,
    W: WallClock,
{
    /// Replace the timestamp source
    pub fn with_clock<V: WallClock>(self, clock: V) -> SamplingLoop<C, K, T, S, V> {
        SamplingLoop {
            controller: self.controller,
            transport: self.transport,
            codec: self.codec,
            sink: self.sink,
            clock,
            timing: self.timing,
            last_sent: self.last_sent,
            packets_sent: self.packets_sent,
        }
    }

    /// Run until cancelled or a fatal error
    ///
    /// # Returns
    ///
    /// The cancellation's [`StopReason`] on a clean stop.
    ///
    /// # Errors
    ///
    /// - [`UplinkError::ControllerRead`] if the controller fails
    /// - [`UplinkError::Encode`] if a packet cannot be serialized
    /// - [`UplinkError::Send`] if the transport rejects a datagram
    pub async fn run(mut self, mut cancel: CancelSignal) -> Result<StopReason> {
        // First ticks fire one period after start, not immediately
        let start = Instant::now();
        let mut sample_ticker =
            interval_at(start + self.timing.sample_period, self.timing.sample_period);
        sample_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut diagnostic_ticker = interval_at(
            start + self.timing.diagnostic_period,
            self.timing.diagnostic_period,
        );
        diagnostic_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                reason = cancel.cancelled() => return Ok(reason),

                _ = diagnostic_ticker.tick() => self.report(),

                _ = sample_ticker.tick() => self.sample().await?,
            }
        }
    }

    /// One sampling tick: read, stamp, encode, send
    async fn sample(&mut self) -> Result<()> {
        let state = self
            .controller
            .updated_state()
            .map_err(UplinkError::ControllerRead)?;

        let packet = Packet::at(state, self.stamp());
        let datagram = self.codec.encode(&packet)?;
        self.transport
            .send(&datagram)
            .await
            .map_err(UplinkError::Send)?;

        self.packets_sent += 1;
        self.last_sent = Some(packet);
        Ok(())
    }

    /// Current wall-clock time, nudged past the previous packet if the
    /// clock stood still or was stepped back
    fn stamp(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        match &self.last_sent {
            Some(previous) if now <= previous.sent_at => {
                previous.sent_at + chrono::Duration::microseconds(MIN_STAMP_STEP_US)
            }
            _ => now,
        }
    }

    fn report(&mut self) {
        let diagnostic = Diagnostic {
            packets_sent: self.packets_sent,
            last_sent: self.last_sent.as_ref(),
        };
        self.sink.report(&diagnostic);
    }
}
