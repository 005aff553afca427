//! Host USB access through libusb.

use crate::device::DeviceDescriptor;
use crate::error::{Error, Result};
use crate::transport::{UsbBus, UsbLink};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, TransferType};
use std::time::Duration;
use tracing::{debug, trace};

/// Timeout for a single endpoint write.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// The system USB bus via the libusb global context.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusbBus;

impl RusbBus {
    pub fn new() -> Self {
        Self
    }
}

fn read_product(
    device: &Device<GlobalContext>,
    descriptor: &rusb::DeviceDescriptor,
) -> Option<String> {
    descriptor.product_string_index()?;

    let handle = match device.open() {
        Ok(handle) => handle,
        Err(e) => {
            debug!(
                bus = device.bus_number(),
                address = device.address(),
                "Cannot open device for product string: {}",
                e
            );
            return None;
        }
    };

    match handle.read_product_string_ascii(descriptor) {
        Ok(product) => Some(product),
        Err(e) => {
            debug!(
                bus = device.bus_number(),
                address = device.address(),
                "Cannot read product string: {}",
                e
            );
            None
        }
    }
}

fn claim_failed(step: &str, e: rusb::Error) -> Error {
    Error::ClaimFailed(format!("{step}: {e}"))
}

impl UsbBus for RusbBus {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let list = rusb::devices().map_err(|e| Error::Usb(e.to_string()))?;

        let mut devices = Vec::with_capacity(list.len());
        for device in list.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    debug!(
                        bus = device.bus_number(),
                        address = device.address(),
                        "Skipping device without descriptor: {}",
                        e
                    );
                    continue;
                }
            };

            devices.push(DeviceDescriptor {
                vid: descriptor.vendor_id(),
                pid: descriptor.product_id(),
                bus_number: device.bus_number(),
                address: device.address(),
                product: read_product(&device, &descriptor),
            });
        }

        Ok(devices)
    }

    fn claim(&self, target: &DeviceDescriptor) -> Result<Box<dyn UsbLink>> {
        let list = rusb::devices().map_err(|e| Error::Usb(e.to_string()))?;
        let device = list
            .iter()
            .find(|d| d.bus_number() == target.bus_number && d.address() == target.address)
            .ok_or(Error::DeviceNotFound {
                vid: target.vid,
                pid: target.pid,
            })?;

        let handle = device.open().map_err(|e| claim_failed("open", e))?;
        let config = device
            .config_descriptor(0)
            .map_err(|e| claim_failed("config descriptor", e))?;

        // Unsupported on some platforms; claiming still works there without it.
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {}", e);
        }

        match handle.active_configuration() {
            Ok(active) if active == config.number() => {
                debug!(config = active, "Configuration already active");
            }
            _ => handle
                .set_active_configuration(config.number())
                .map_err(|e| claim_failed("set configuration", e))?,
        }

        let endpoints: Vec<OutEndpoint> = config
            .interfaces()
            .flat_map(|i| i.descriptors())
            .flat_map(|interface| {
                let number = interface.interface_number();
                let setting = interface.setting_number();
                interface
                    .endpoint_descriptors()
                    .filter(|e| e.direction() == Direction::Out)
                    .map(|e| OutEndpoint {
                        address: e.address(),
                        interface: number,
                        setting,
                        transfer_type: e.transfer_type(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let addresses: Vec<u8> = endpoints.iter().map(|e| e.address).collect();
        debug!(
            config = config.number(),
            endpoints = format_args!("{:02X?}", addresses),
            "Device configured"
        );

        let interfaces = interfaces_to_claim(&endpoints);
        let mut link = RusbLink {
            handle,
            endpoints,
            claimed: Vec::new(),
        };
        // Released again by `Drop` if a later interface is refused.
        for (interface, setting) in interfaces {
            link.claim_interface(interface, setting)?;
        }

        Ok(Box::new(link))
    }
}

/// Interfaces owning at least one OUT endpoint, with the alternate setting
/// that exposes it. The first setting listed for an interface wins.
fn interfaces_to_claim(endpoints: &[OutEndpoint]) -> Vec<(u8, u8)> {
    let mut interfaces: Vec<(u8, u8)> = Vec::new();
    for endpoint in endpoints {
        if !interfaces.iter().any(|(i, _)| *i == endpoint.interface) {
            interfaces.push((endpoint.interface, endpoint.setting));
        }
    }
    interfaces
}

#[derive(Debug, Clone, Copy)]
struct OutEndpoint {
    address: u8,
    interface: u8,
    setting: u8,
    transfer_type: TransferType,
}

/// A configured device handle.
pub struct RusbLink {
    handle: DeviceHandle<GlobalContext>,
    endpoints: Vec<OutEndpoint>,
    claimed: Vec<u8>,
}

impl RusbLink {
    fn endpoint(&self, address: u8) -> Result<OutEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.address == address)
            .copied()
            .ok_or_else(|| Error::Transport(format!("no OUT endpoint 0x{address:02X} on device")))
    }

    fn claim_interface(&mut self, interface: u8, setting: u8) -> Result<()> {
        self.handle
            .claim_interface(interface)
            .map_err(|e| claim_failed("claim interface", e))?;
        self.claimed.push(interface);

        if setting != 0 {
            self.handle
                .set_alternate_setting(interface, setting)
                .map_err(|e| claim_failed("alternate setting", e))?;
        }

        debug!(interface = interface, setting = setting, "Interface claimed");
        Ok(())
    }
}

impl UsbLink for RusbLink {
    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize> {
        let target = self.endpoint(endpoint)?;

        trace!(
            endpoint = format_args!("0x{:02X}", target.address),
            transfer = ?target.transfer_type,
            "Writing"
        );

        let written = match target.transfer_type {
            TransferType::Bulk => self.handle.write_bulk(target.address, data, WRITE_TIMEOUT),
            TransferType::Interrupt => {
                self.handle
                    .write_interrupt(target.address, data, WRITE_TIMEOUT)
            }
            other => {
                return Err(Error::Transport(format!(
                    "unsupported transfer type {other:?} on endpoint 0x{:02X}",
                    target.address
                )))
            }
        };

        written.map_err(|e| Error::Transport(e.to_string()))
    }
}

impl Drop for RusbLink {
    fn drop(&mut self) {
        for interface in self.claimed.drain(..) {
            self.handle.release_interface(interface).ok();
        }
    }
}
