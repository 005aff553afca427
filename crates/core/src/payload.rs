//! Color packet framing.
//!
//! A packet is a vendor-specific header, the color bytes, and a fixed footer.
//! All three are kept as hex text and decoded together, so a malformed header
//! or footer from a damaged config surfaces the same way as a bad color.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default frame header for the reference controller family.
pub const DEFAULT_PACKET_HEADER: &str = "018500000014030400";

/// Default frame footer for the reference controller family (52 bytes).
pub const DEFAULT_PACKET_FOOTER: &str = "00000000000000000000000000180000000000000000000000000000000000000000000000000000000000000000000000000000";

/// Fixed framing bytes surrounding the color field, as hex text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTemplate {
    pub header: String,
    pub footer: String,
}

impl PacketTemplate {
    pub fn new(header: impl Into<String>, footer: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
        }
    }
}

impl Default for PacketTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PACKET_HEADER, DEFAULT_PACKET_FOOTER)
    }
}

/// Strip every `#` and lowercase the color.
pub fn normalize_color(color: &str) -> String {
    color.replace('#', "").to_lowercase()
}

/// Decode a hex string into bytes.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::InvalidPayload(format!(
            "odd number of hex digits ({})",
            text.len()
        )));
    }

    if let Some(bad) = text.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::InvalidPayload(format!(
            "non-hex character {bad:?}"
        )));
    }

    // Every char is ASCII past the check above, so byte slicing is on char boundaries.
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|e| Error::InvalidPayload(e.to_string()))
        })
        .collect()
}

/// Build the packet bytes for a color.
pub fn build_payload(template: &PacketTemplate, color: &str) -> Result<Vec<u8>> {
    let color = normalize_color(color);
    let joined = format!("{}{}{}", template.header, color, template.footer);
    decode_hex(&joined)
}
