//! Transport channel contract and the per-channel transaction lock.
//!
//! A [`TransportChannel`] moves raw bytes over one medium. Concrete channels
//! (serial, TCP, USB, mocks) live in `spectro-bus`; this module only defines
//! the contract and the [`Bus`] wrapper that every device shares between its
//! features.
//!
//! # Exclusive transactions
//!
//! Instrument firmware cannot multiplex: a second command must not be written
//! until the reply to the first has been fully read or has timed out. [`Bus`]
//! holds the channel behind one mutex and only hands it out inside
//! [`Bus::transaction`], so a whole write/read exchange runs under a single
//! lock acquisition. A second thread calling `transaction` blocks until the
//! first exchange finishes.
//!
//! ```rust,ignore
//! let reply = bus.transaction(|tx| {
//!     tx.write_all(Endpoint::Control, &frame)?;
//!     Ok(tx.read_exact(Endpoint::Control, 5, timeout)?)
//! })?;
//! ```
//!
//! # Timeouts
//!
//! `read_exact` either returns exactly the requested byte count or fails. When
//! an exchange ends in [`BusError::Timeout`] (or a reply whose framing could
//! not be parsed), the bus discards whatever input is pending before
//! releasing the lock so a late reply cannot be read as the answer to the
//! next, unrelated exchange.

use crate::error::{BusError, ProtocolError, SpectroError, SpectroResult};
use crate::family::BusFamily;
use crate::limits::{DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Logical endpoint addressed by a read or write.
///
/// Single-stream media (serial, TCP) ignore it. USB channels map `Control`
/// to the command endpoint pair and `Data` to the bulk-in endpoint that
/// carries spectra on high-speed models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endpoint {
    /// Command/response endpoint
    #[default]
    Control,
    /// Bulk data endpoint
    Data,
}

/// Settings applied when a channel is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Default deadline for `read_exact` when the caller has none.
    pub read_timeout: Duration,
    /// Deadline for a single write.
    pub write_timeout: Duration,
    /// Discard stale input immediately after opening.
    pub clear_on_open: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            clear_on_open: true,
        }
    }
}

/// A byte pipe over one physical medium.
///
/// Implementations must honour the `read_exact` contract: either exactly
/// `len` bytes are returned, or an error is. Partial success is never
/// reported as `Ok`.
pub trait TransportChannel: Send {
    /// Medium this channel runs over.
    fn bus(&self) -> BusFamily;

    /// Human-readable target (port path, socket address, USB location).
    fn describe(&self) -> String;

    /// Acquire the underlying OS/driver handle.
    fn open(&mut self, config: &ChannelConfig) -> Result<(), BusError>;

    /// Whether `open` succeeded and `close` has not been called since.
    fn is_open(&self) -> bool;

    /// Release the underlying handle. Closing a closed channel is a no-op.
    fn close(&mut self) -> Result<(), BusError>;

    /// Write bytes, returning how many the medium accepted.
    fn write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<usize, BusError>;

    /// Read exactly `len` bytes or fail within `timeout`.
    fn read_exact(
        &mut self,
        endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError>;

    /// Discard any pending input, returning the number of bytes dropped.
    fn clear_input(&mut self) -> Result<usize, BusError> {
        Ok(0)
    }
}

/// Exclusive access to a channel for the duration of one exchange.
///
/// Only obtainable through [`Bus::transaction`] or [`Bus::try_transaction`].
pub struct Transaction<'a> {
    channel: &'a mut (dyn TransportChannel + 'static),
}

impl Transaction<'_> {
    /// Medium of the underlying channel.
    pub fn bus(&self) -> BusFamily {
        self.channel.bus()
    }

    /// Write every byte or fail with [`BusError::Io`].
    pub fn write_all(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<(), BusError> {
        let written = self.channel.write(endpoint, bytes)?;
        if written != bytes.len() {
            return Err(BusError::io(
                self.channel.bus(),
                std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, bytes.len()),
                ),
            ));
        }
        Ok(())
    }

    /// Read exactly `len` bytes within `timeout`.
    pub fn read_exact(
        &mut self,
        endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        self.channel.read_exact(endpoint, len, timeout)
    }
}

/// Whether bytes of a failed exchange may still be in flight or unread.
fn leaves_stale_input(err: &SpectroError) -> bool {
    matches!(
        err,
        SpectroError::Bus(BusError::Timeout { .. })
            | SpectroError::Protocol(ProtocolError::Malformed { .. })
    )
}

/// A channel shared by every feature of one device.
///
/// Devices hold it as `Arc<Bus>`; it is never cloned or duplicated.
pub struct Bus {
    family: BusFamily,
    label: String,
    default_timeout: Duration,
    channel: Mutex<Box<dyn TransportChannel>>,
}

impl Bus {
    /// Open `channel` with `config` and wrap it.
    pub fn open(mut channel: Box<dyn TransportChannel>, config: &ChannelConfig) -> SpectroResult<Self> {
        if !channel.is_open() {
            channel.open(config)?;
        }
        if config.clear_on_open {
            let dropped = channel.clear_input()?;
            if dropped > 0 {
                debug!(bytes = dropped, "Discarded stale input after open");
            }
        }
        info!(bus = %channel.bus(), target = %channel.describe(), "Opened transport channel");
        Ok(Self::from_open(channel, config.read_timeout))
    }

    /// Wrap a channel that is already open.
    ///
    /// Fails with [`BusError::NotOpen`] if it is not.
    pub fn from_channel(channel: Box<dyn TransportChannel>, default_timeout: Duration) -> SpectroResult<Self> {
        if !channel.is_open() {
            return Err(BusError::NotOpen { bus: channel.bus() }.into());
        }
        Ok(Self::from_open(channel, default_timeout))
    }

    fn from_open(channel: Box<dyn TransportChannel>, default_timeout: Duration) -> Self {
        Self {
            family: channel.bus(),
            label: channel.describe(),
            default_timeout,
            channel: Mutex::new(channel),
        }
    }

    /// Medium of the wrapped channel.
    pub fn family(&self) -> BusFamily {
        self.family
    }

    /// Target description captured at construction.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read deadline used when a caller does not supply one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Whether the channel is currently open. Blocks while a transaction runs.
    pub fn is_open(&self) -> bool {
        self.channel.lock().is_open()
    }

    /// Run one exclusive exchange, blocking until the channel is free.
    pub fn transaction<T, F>(&self, exchange: F) -> SpectroResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> SpectroResult<T>,
    {
        let mut guard = self.channel.lock();
        Self::run(&mut **guard, exchange)
    }

    /// Run one exclusive exchange, failing with [`SpectroError::DeviceBusy`]
    /// instead of waiting if another caller holds the channel.
    pub fn try_transaction<T, F>(&self, exchange: F) -> SpectroResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> SpectroResult<T>,
    {
        let mut guard = self
            .channel
            .try_lock()
            .ok_or(SpectroError::DeviceBusy { bus: self.family })?;
        Self::run(&mut **guard, exchange)
    }

    fn run<T, F>(channel: &mut (dyn TransportChannel + 'static), exchange: F) -> SpectroResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> SpectroResult<T>,
    {
        if !channel.is_open() {
            return Err(BusError::NotOpen { bus: channel.bus() }.into());
        }

        let result = {
            let mut tx = Transaction { channel: &mut *channel };
            exchange(&mut tx)
        };

        if let Err(e) = &result {
            if leaves_stale_input(e) {
                match channel.clear_input() {
                    Ok(dropped) => {
                        warn!(bus = %channel.bus(), dropped, error = %e, "Exchange failed; discarded pending input")
                    }
                    Err(drain) => {
                        warn!(bus = %channel.bus(), error = %drain, "Exchange failed; input drain failed")
                    }
                }
            }
        }

        result
    }

    /// Close the underlying channel. Waits for any running transaction.
    pub fn close(&self) -> Result<(), BusError> {
        let mut guard = self.channel.lock();
        guard.close()?;
        info!(bus = %self.family, target = %self.label, "Closed transport channel");
        Ok(())
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("family", &self.family)
            .field("label", &self.label)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
