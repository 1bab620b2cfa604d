//! # Error Types
//!
//! Custom error types for RC Uplink using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for RC Uplink
#[derive(Debug, Error)]
pub enum UplinkError {
    /// Profile file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Profile or session values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The UDP channel to the receiver could not be opened
    #[error("failed to open transport to {address}: {source}")]
    Transport {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Not even the first input device could be opened
    #[error("no joysticks found: {0}")]
    NoDevicesFound(#[source] DeviceError),

    /// The profile does not fit the opened devices
    #[error("Profile error: {0}")]
    Profile(String),

    /// Reading the controller failed mid-loop
    #[error("failed getting controller state: {0}")]
    ControllerRead(#[source] DeviceError),

    /// Reading a device failed outside the sampling loop
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// A packet could not be serialized
    #[error("failed encoding packet: {0}")]
    Encode(#[from] CodecError),

    /// Writing a datagram failed
    #[error("failed sending packet: {0}")]
    Send(#[source] std::io::Error),
}

/// Input device errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No device exists at this index
    #[error("no input device at index {0}")]
    NotFound(usize),

    /// The device node exists but could not be opened
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading device state failed (usually unplugged)
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Scanning for device nodes failed
    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[source] std::io::Error),
}

/// Packet codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for RC Uplink
pub type Result<T> = std::result::Result<T, UplinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_read_identifies_source() {
        let err = UplinkError::ControllerRead(DeviceError::Read {
            name: "Wireless Controller".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("failed getting controller state"));
        assert!(msg.contains("Wireless Controller"));
    }

    #[test]
    fn test_no_devices_message() {
        let err = UplinkError::NoDevicesFound(DeviceError::NotFound(0));
        assert_eq!(err.to_string(), "no joysticks found: no input device at index 0");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = UplinkError::Send(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(err.source().is_some());
    }
}
