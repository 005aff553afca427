//! Device model: discovery and connection.

use crate::error::{Error, Result};
use crate::ident::DeviceIdentity;
use crate::transport::{UsbBus, UsbLink};
use tracing::{debug, info};

/// Placeholder shown when a device has no readable product string.
pub const UNKNOWN_PRODUCT: &str = "Unknown";

/// Information about a USB device visible to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vid: u16,
    pub pid: u16,
    pub bus_number: u8,
    pub address: u8,
    /// `None` when the string descriptor is absent or unreadable.
    pub product: Option<String>,
}

impl DeviceDescriptor {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.vid, self.pid)
    }

    /// Product string, or [`UNKNOWN_PRODUCT`].
    pub fn product_name(&self) -> &str {
        self.product.as_deref().unwrap_or(UNKNOWN_PRODUCT)
    }
}

/// Enumerate all USB devices currently visible to the host.
///
/// An empty result is not an error. Note that on most hosts a user without
/// USB permissions also sees an empty or partial list, so "nothing attached"
/// and "permission denied" cannot be told apart here.
pub fn enumerate(bus: &dyn UsbBus) -> Result<impl Iterator<Item = DeviceDescriptor>> {
    debug!("Starting USB device enumeration");
    let devices = bus.devices()?;
    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices.into_iter())
}

/// Find the first device matching `identity` and claim it.
///
/// When several devices match, the first one in host enumeration order wins;
/// that order is not guaranteed to be stable between runs.
pub fn locate(bus: &dyn UsbBus, identity: DeviceIdentity) -> Result<Box<dyn UsbLink>> {
    let device = enumerate(bus)?
        .find(|d| d.identity() == identity)
        .ok_or(Error::DeviceNotFound {
            vid: identity.vid,
            pid: identity.pid,
        })?;

    info!(
        vid = format_args!("0x{:04X}", device.vid),
        pid = format_args!("0x{:04X}", device.pid),
        bus = device.bus_number,
        address = device.address,
        product = device.product_name(),
        "Found device"
    );

    bus.claim(&device)
}
