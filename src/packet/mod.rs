//! # Packet Module
//!
//! Wire model for the control link.
//!
//! This module handles:
//! - Typed command state with a discriminator for the receiver
//! - The timestamped outbound envelope
//! - Pluggable serialization (bincode, JSON)

pub mod codec;
pub mod protocol;
