//! USB transport abstraction for device communication.
//!
//! Provides a trait-based seam over the host USB stack so that real devices
//! (see [`crate::usb`]) and scripted mock devices share the same interface.

use crate::device::DeviceDescriptor;
use crate::error::Result;

/// An open, claimed session to one physical device.
///
/// Dropping the link releases the device. After a write fails the link must
/// not be reused; a fresh one comes from [`UsbBus::claim`].
pub trait UsbLink {
    /// Blocking write of `data` to the OUT endpoint `endpoint`.
    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize>;
}

/// The host USB subsystem.
pub trait UsbBus {
    /// List every device currently visible to the host.
    ///
    /// A device whose product string cannot be read is still listed, with
    /// `product: None`.
    fn devices(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Open and configure a listed device so transfers can occur.
    fn claim(&self, device: &DeviceDescriptor) -> Result<Box<dyn UsbLink>>;
}
