//! Packet delivery with error classification and a single reconnect.
//!
//! A failed write never reuses its link: the device is located and claimed
//! again, and the packet is written once more on the fresh link.

use crate::device::locate;
use crate::error::{Error, Result};
use crate::ident::DeviceIdentity;
use crate::transport::{UsbBus, UsbLink};
use tracing::{debug, trace, warn};

/// Classification of delivery errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Write failed on a claimed device (unplug, stall, timeout).
    Transport,
    /// Anything else; reported to the caller as-is.
    Fatal,
}

impl ErrorClass {
    /// Classify an error for reconnect decisions.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::Transport(_) => Self::Transport,
            _ => Self::Fatal,
        }
    }

    /// Whether this error class is worth a reconnect cycle.
    pub fn triggers_reconnect(&self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// How a successful send got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    FirstAttempt,
    AfterReconnect,
}

/// Write `payload` to `endpoint`, reconnecting once on a transport error.
///
/// `link` must be a session to a device matching `identity`; it is consumed
/// and dropped before any reconnect.
pub fn send(
    bus: &dyn UsbBus,
    identity: DeviceIdentity,
    mut link: Box<dyn UsbLink>,
    endpoint: u8,
    payload: &[u8],
) -> Result<Delivery> {
    trace!(
        endpoint = endpoint,
        len = payload.len(),
        payload_hex = format_args!("{:02X?}", payload),
        "USB TX"
    );

    let err = match link.write(endpoint, payload) {
        Ok(written) => {
            debug!(written = written, "Packet written");
            return Ok(Delivery::FirstAttempt);
        }
        Err(e) => e,
    };

    let class = ErrorClass::classify(&err);
    if !class.triggers_reconnect() {
        warn!("Packet write failed (class={:?}): {}", class, err);
        return Err(err);
    }

    debug!("Transport error on first write: {}, reconnecting...", err);
    drop(link);

    let mut link = locate(bus, identity).map_err(|e| {
        warn!("Reconnect to {} failed: {}", identity, e);
        e
    })?;

    match link.write(endpoint, payload) {
        Ok(written) => {
            debug!(written = written, "Packet written after reconnect");
            Ok(Delivery::AfterReconnect)
        }
        Err(e) => {
            warn!("Packet write failed after reconnect: {}", e);
            Err(e)
        }
    }
}
