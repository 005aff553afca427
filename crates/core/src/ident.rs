//! USB vendor/product identifiers and their loose input forms.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vendor/product pair identifying a class of physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vid: u16,
    pub pid: u16,
}

impl DeviceIdentity {
    pub fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VID:0x{:04x} PID:0x{:04x}", self.vid, self.pid)
    }
}

/// An identifier as supplied by a user or an older config file.
///
/// Strings are always read as base-16 (`"0416"`, `"0x0416"`); integers are
/// taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HexOrInt {
    Int(i64),
    Hex(String),
}

impl HexOrInt {
    /// Normalize to the 16-bit integer form.
    pub fn parse(&self, field: &'static str) -> Result<u16> {
        let invalid = || Error::InvalidIdentifier {
            field,
            value: self.to_string(),
        };

        match self {
            Self::Int(value) => u16::try_from(*value).map_err(|_| invalid()),
            Self::Hex(text) => {
                let trimmed = text.trim();
                let digits = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .unwrap_or(trimmed);
                u16::from_str_radix(digits, 16).map_err(|_| invalid())
            }
        }
    }
}

impl fmt::Display for HexOrInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Hex(text) => write!(f, "{text}"),
        }
    }
}

impl FromStr for HexOrInt {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::Hex(s.to_string()))
    }
}

impl From<u16> for HexOrInt {
    fn from(value: u16) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for HexOrInt {
    fn from(value: &str) -> Self {
        Self::Hex(value.to_string())
    }
}

/// Parse a vendor or product identifier into its integer form.
pub fn parse_identifier(field: &'static str, value: &HexOrInt) -> Result<u16> {
    value.parse(field)
}
