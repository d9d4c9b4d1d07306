//! RS-232 channel backed by the `serialport` crate.
//!
//! Opened 8N1 without flow control, the settings every supported serial
//! model uses. Serial lines carry a single stream, so the endpoint argument
//! is ignored.

use crate::io::{drain_reader, read_exact_within, ZeroRead};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use spectro_core::bus::{ChannelConfig, Endpoint, TransportChannel};
use spectro_core::error::BusError;
use spectro_core::family::BusFamily;
use spectro_core::limits::DRAIN_QUIET_PERIOD;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

const BUS: BusFamily = BusFamily::Rs232;

/// Serial port channel.
pub struct SerialChannel {
    path: String,
    baud_rate: u32,
    write_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialChannel {
    /// A closed channel for `path` at `baud_rate`.
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            write_timeout: spectro_core::limits::DEFAULT_WRITE_TIMEOUT,
            port: None,
        }
    }

    /// Port path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, BusError> {
        self.port.as_mut().ok_or(BusError::NotOpen { bus: BUS })
    }
}

impl TransportChannel for SerialChannel {
    fn bus(&self) -> BusFamily {
        BUS
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }

    fn open(&mut self, config: &ChannelConfig) -> Result<(), BusError> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| BusError::io(BUS, e.into()))?;
        self.write_timeout = config.write_timeout;
        self.port = Some(port);
        info!(port = %self.path, baud = self.baud_rate, "Serial port opened");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<(), BusError> {
        if self.port.take().is_some() {
            debug!(port = %self.path, "Serial port closed");
        }
        Ok(())
    }

    fn write(&mut self, _endpoint: Endpoint, bytes: &[u8]) -> Result<usize, BusError> {
        let write_timeout = self.write_timeout;
        let port = self.port()?;
        port.set_timeout(write_timeout)
            .map_err(|e| BusError::io(BUS, e.into()))?;
        port.write_all(bytes).map_err(|e| BusError::io(BUS, e))?;
        port.flush().map_err(|e| BusError::io(BUS, e))?;
        Ok(bytes.len())
    }

    fn read_exact(
        &mut self,
        _endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let port = self.port()?;
        read_exact_within(BUS, port, len, timeout, ZeroRead::Retry, |p, left| {
            p.set_timeout(left).map_err(Into::into)
        })
    }

    fn clear_input(&mut self) -> Result<usize, BusError> {
        let port = self.port()?;
        let queued = port
            .bytes_to_read()
            .map_err(|e| BusError::io(BUS, e.into()))? as usize;
        port.clear(ClearBuffer::Input)
            .map_err(|e| BusError::io(BUS, e.into()))?;

        // Bytes still in flight on the wire land after the clear.
        port.set_timeout(DRAIN_QUIET_PERIOD)
            .map_err(|e| BusError::io(BUS, e.into()))?;
        let late = drain_reader(port, 64 * 1024);
        Ok(queued + late)
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// Names of the serial ports present on this host.
pub fn available_ports() -> Result<Vec<String>, BusError> {
    let ports = serialport::available_ports().map_err(|e| BusError::io(BUS, e.into()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
