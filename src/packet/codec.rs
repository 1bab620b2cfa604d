//! # Packet Codec
//!
//! Serializes [`Packet`]s into datagram payloads.
//!
//! The receiver must use the same codec. `bincode` is the compact default;
//! `json` is handy when sniffing the link with `tcpdump` or `nc -u`.

use bytes::Bytes;
use serde::Deserialize;

use super::protocol::Packet;
use crate::error::CodecError;

/// Encodes and decodes packets for the wire
#[cfg_attr(test, mockall::automock)]
pub trait PacketCodec: Send {
    /// Serialize one packet into a datagram payload
    fn encode(&self, packet: &Packet) -> Result<Bytes, CodecError>;

    /// Parse a datagram payload back into a packet
    fn decode(&self, payload: &[u8]) -> Result<Packet, CodecError>;
}

impl<T: PacketCodec + ?Sized> PacketCodec for Box<T> {
    fn encode(&self, packet: &Packet) -> Result<Bytes, CodecError> {
        (**self).encode(packet)
    }

    fn decode(&self, payload: &[u8]) -> Result<Packet, CodecError> {
        (**self).decode(payload)
    }
}

/// bincode 1.x with default options
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl PacketCodec for BincodeCodec {
    fn encode(&self, packet: &Packet) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(bincode::serialize(packet)?))
    }

    fn decode(&self, payload: &[u8]) -> Result<Packet, CodecError> {
        Ok(bincode::deserialize(payload)?)
    }
}

/// One JSON object per datagram
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PacketCodec for JsonCodec {
    fn encode(&self, packet: &Packet) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(packet)?))
    }

    fn decode(&self, payload: &[u8]) -> Result<Packet, CodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Codec selectable from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Bincode,
    Json,
}

impl CodecKind {
    /// Instantiate the selected codec
    #[must_use]
    pub fn build(self) -> Box<dyn PacketCodec> {
        match self {
            CodecKind::Bincode => Box::new(BincodeCodec),
            CodecKind::Json => Box::new(JsonCodec),
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecKind::Bincode => f.write_str("bincode"),
            CodecKind::Json => f.write_str("json"),
        }
    }
}
