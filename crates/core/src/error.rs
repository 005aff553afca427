//! Error types for usb-rgb-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No attached USB device matches the requested vendor/product pair.
    #[error("device VID:0x{vid:04x} PID:0x{pid:04x} not found, please check the connection")]
    DeviceNotFound { vid: u16, pid: u16 },

    /// Device found, but the host refused to configure or claim it.
    #[error("unable to claim device: {0}")]
    ClaimFailed(String),

    /// The joined header + color + footer string is not valid hex.
    #[error("invalid hex data ({0}), check the config header/footer or the color code")]
    InvalidPayload(String),

    /// Endpoint write failed on a claimed device.
    #[error("transport error: {0}")]
    Transport(String),

    /// Persisted configuration exists but could not be parsed.
    #[error("config file is corrupted: {0}")]
    ConfigCorrupt(String),

    /// Persisted configuration could not be read or written.
    #[error("config error: {0}")]
    Config(String),

    /// Vendor or product ID missing from both the arguments and the saved config.
    #[error("VID and PID are missing")]
    MissingIdentity,

    /// Vendor or product ID is not a 16-bit hex value.
    #[error("invalid {field}: {value}")]
    InvalidIdentifier { field: &'static str, value: String },

    /// Host USB stack could not be initialised or listed.
    #[error("USB error: {0}")]
    Usb(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
