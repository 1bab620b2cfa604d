//! # RC Uplink Library
//!
//! Drive a remote vehicle from a gamepad over UDP.
//!
//! This library samples joystick input at a fixed rate, maps it to ground
//! vehicle commands (steering, ESC, gear) and sends each sample as one
//! timestamped datagram to a receiver on the vehicle.

pub mod client;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod packet;
pub mod sampling;
pub mod shutdown;
pub mod transport;
