//! USB channel over bulk endpoints, backed by `rusb` (libusb).
//!
//! Spectrometers expose one bulk OUT endpoint for commands, one bulk IN
//! endpoint for command replies and, on high-speed models, a second bulk IN
//! endpoint that streams spectra. [`Endpoint::Control`] maps to the command
//! pair and [`Endpoint::Data`] to the spectrum endpoint.
//!
//! Bulk reads return whole packets, so bytes beyond what `read_exact` asked
//! for are kept per endpoint and served to the next read.

use rusb::{DeviceHandle, GlobalContext};
use spectro_core::bus::{ChannelConfig, Endpoint, TransportChannel};
use spectro_core::error::BusError;
use spectro_core::family::BusFamily;
use spectro_core::limits::DRAIN_QUIET_PERIOD;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const BUS: BusFamily = BusFamily::Usb;
const PACKET: usize = 512;

/// Bulk endpoint addresses of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbEndpoints {
    /// Command OUT endpoint
    pub command_out: u8,
    /// Command reply IN endpoint
    pub command_in: u8,
    /// Spectrum IN endpoint (equal to `command_in` on single-IN models)
    pub data_in: u8,
}

impl UsbEndpoints {
    /// Layout shared by the legacy low-speed models (0x02 out, 0x87 in).
    pub const LEGACY: Self = Self {
        command_out: 0x02,
        command_in: 0x87,
        data_in: 0x82,
    };

    /// Layout shared by the binary-protocol models (0x01 out, 0x81 in).
    pub const BINARY: Self = Self {
        command_out: 0x01,
        command_in: 0x81,
        data_in: 0x81,
    };
}

/// One attached device matching a vendor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Bus number
    pub bus_number: u8,
    /// Device address on the bus
    pub address: u8,
}

/// List attached devices whose vendor id equals `vendor_id`.
pub fn scan(vendor_id: u16) -> Result<Vec<UsbDeviceInfo>, BusError> {
    let devices = rusb::devices().map_err(usb_err)?;
    let mut found = Vec::new();
    for device in devices.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                debug!(error = %e, "Skipping device with unreadable descriptor");
                continue;
            }
        };
        if desc.vendor_id() == vendor_id {
            found.push(UsbDeviceInfo {
                vendor_id,
                product_id: desc.product_id(),
                bus_number: device.bus_number(),
                address: device.address(),
            });
        }
    }
    Ok(found)
}

fn usb_err(e: rusb::Error) -> BusError {
    BusError::io_message(BUS, e.to_string())
}

/// Bulk-endpoint channel to one USB spectrometer.
pub struct UsbChannel {
    vendor_id: u16,
    product_id: u16,
    serial_number: Option<String>,
    endpoints: UsbEndpoints,
    write_timeout: Duration,
    handle: Option<DeviceHandle<GlobalContext>>,
    control_pending: VecDeque<u8>,
    data_pending: VecDeque<u8>,
}

impl UsbChannel {
    /// A closed channel for the first device matching `vendor_id:product_id`
    /// (and `serial_number`, when given).
    pub fn new(
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<String>,
        endpoints: UsbEndpoints,
    ) -> Self {
        Self {
            vendor_id,
            product_id,
            serial_number,
            endpoints,
            write_timeout: spectro_core::limits::DEFAULT_WRITE_TIMEOUT,
            handle: None,
            control_pending: VecDeque::new(),
            data_pending: VecDeque::new(),
        }
    }

    fn find_handle(&self) -> Result<DeviceHandle<GlobalContext>, BusError> {
        let devices = rusb::devices().map_err(usb_err)?;
        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if desc.vendor_id() != self.vendor_id || desc.product_id() != self.product_id {
                continue;
            }
            let handle = device.open().map_err(usb_err)?;
            if let Some(wanted) = &self.serial_number {
                let actual = desc
                    .serial_number_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
                if actual.as_deref() != Some(wanted.as_str()) {
                    continue;
                }
            }
            return Ok(handle);
        }
        Err(BusError::io(
            BUS,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no USB device {}", self.describe()),
            ),
        ))
    }

    fn address(&self, endpoint: Endpoint) -> u8 {
        match endpoint {
            Endpoint::Control => self.endpoints.command_in,
            Endpoint::Data => self.endpoints.data_in,
        }
    }
}

impl TransportChannel for UsbChannel {
    fn bus(&self) -> BusFamily {
        BUS
    }

    fn describe(&self) -> String {
        match &self.serial_number {
            Some(sn) => format!("{:04x}:{:04x} ({})", self.vendor_id, self.product_id, sn),
            None => format!("{:04x}:{:04x}", self.vendor_id, self.product_id),
        }
    }

    fn open(&mut self, config: &ChannelConfig) -> Result<(), BusError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let mut handle = self.find_handle()?;
        // Not supported on every platform.
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(0).map_err(usb_err)?;
        self.write_timeout = config.write_timeout;
        self.handle = Some(handle);
        info!(device = %self.describe(), "USB device opened");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn close(&mut self) -> Result<(), BusError> {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(0) {
                warn!(error = %e, "Failed to release USB interface");
            }
            self.control_pending.clear();
            self.data_pending.clear();
            debug!(device = %self.describe(), "USB device closed");
        }
        Ok(())
    }

    fn write(&mut self, _endpoint: Endpoint, bytes: &[u8]) -> Result<usize, BusError> {
        let handle = self.handle.as_ref().ok_or(BusError::NotOpen { bus: BUS })?;
        handle
            .write_bulk(self.endpoints.command_out, bytes, self.write_timeout)
            .map_err(usb_err)
    }

    fn read_exact(
        &mut self,
        endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let address = self.address(endpoint);
        let handle = self.handle.as_ref().ok_or(BusError::NotOpen { bus: BUS })?;
        let pending = match endpoint {
            Endpoint::Control => &mut self.control_pending,
            Endpoint::Data => &mut self.data_pending,
        };

        let deadline = Instant::now() + timeout;
        let mut packet = vec![0u8; PACKET.max(len.min(64 * PACKET))];
        while pending.len() < len {
            let now = Instant::now();
            if now >= deadline {
                let received = pending.len();
                pending.clear();
                return Err(BusError::Timeout {
                    bus: BUS,
                    expected: len,
                    received,
                    timeout,
                });
            }
            match handle.read_bulk(address, &mut packet, deadline - now) {
                Ok(n) => pending.extend(&packet[..n]),
                Err(rusb::Error::Timeout) => {}
                Err(e) => {
                    pending.clear();
                    return Err(usb_err(e));
                }
            }
        }
        Ok(pending.drain(..len).collect())
    }

    fn clear_input(&mut self) -> Result<usize, BusError> {
        let handle = self.handle.as_ref().ok_or(BusError::NotOpen { bus: BUS })?;
        let mut dropped = self.control_pending.len() + self.data_pending.len();
        self.control_pending.clear();
        self.data_pending.clear();

        let mut packet = [0u8; PACKET];
        let mut addresses = vec![self.endpoints.command_in];
        if self.endpoints.data_in != self.endpoints.command_in {
            addresses.push(self.endpoints.data_in);
        }
        for address in addresses {
            while let Ok(n) = handle.read_bulk(address, &mut packet, DRAIN_QUIET_PERIOD) {
                if n == 0 {
                    break;
                }
                dropped += n;
            }
        }
        Ok(dropped)
    }
}

impl std::fmt::Debug for UsbChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbChannel")
            .field("device", &self.describe())
            .field("endpoints", &self.endpoints)
            .field("open", &self.handle.is_some())
            .finish()
    }
}
