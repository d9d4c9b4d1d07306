//! `spectro-bus`
//!
//! Concrete [`TransportChannel`](spectro_core::bus::TransportChannel)
//! implementations, one per medium:
//!
//! | Channel | Medium | Feature flag |
//! |---|---|---|
//! | [`SerialChannel`] | RS-232 via `serialport` | `serial` (default) |
//! | [`TcpChannel`] | Ethernet via `std::net` | always |
//! | `UsbChannel` | USB bulk endpoints via `rusb` | `usb` |
//! | [`MockChannel`] / [`LoopbackChannel`] | in-memory | always |
//!
//! All channels are blocking and honour the same `read_exact` contract:
//! exactly the requested byte count, or a `Timeout`/`Io` error.

mod io;
pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;
#[cfg(feature = "usb")]
pub mod usb;

pub use mock::{LoopbackChannel, MockChannel, MockDevice, MockEvent};
#[cfg(feature = "serial")]
pub use serial::SerialChannel;
pub use tcp::TcpChannel;
#[cfg(feature = "usb")]
pub use usb::{UsbChannel, UsbDeviceInfo, UsbEndpoints};
