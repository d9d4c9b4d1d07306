//! `spectro-core`
//!
//! Core traits and types for the spectrometer dispatch stack.
//!
//! ## Three Layers
//!
//! - **Bus**: [`bus::TransportChannel`] moves raw bytes over one medium, and
//!   [`bus::Bus`] serializes whole request/response exchanges on it.
//! - **Protocol**: [`protocol::WireProtocol`] encodes typed requests and
//!   decodes replies for one protocol family.
//! - **Capabilities**: [`capabilities::CapabilityTable`] records which
//!   protocol answers each feature over each bus for a given model.
//!
//! Concrete channels live in `spectro-bus`, protocol families in
//! `spectro-protocol`, features in `spectro-features`, and device assembly in
//! `spectro-devices`.
//!
//! ## Example
//!
//! ```rust
//! use spectro_core::capabilities::{bind, CapabilityTable};
//! use spectro_core::family::{BusFamily, FeatureFamily, ProtocolFamily};
//!
//! let table = CapabilityTable::new(
//!     "USB2000",
//!     &[bind(FeatureFamily::Spectrometer, BusFamily::Usb, ProtocolFamily::OoiLegacy)],
//! );
//!
//! assert_eq!(
//!     table
//!         .supported_protocol(FeatureFamily::Spectrometer, BusFamily::Usb)
//!         .unwrap(),
//!     ProtocolFamily::OoiLegacy
//! );
//! assert!(table
//!     .supported_protocol(FeatureFamily::ThermoElectric, BusFamily::Usb)
//!     .unwrap_err()
//!     .is_capability_probe());
//! ```

pub mod bus;
pub mod capabilities;
pub mod error;
pub mod error_recovery;
pub mod family;
pub mod limits;
pub mod protocol;

pub use bus::{Bus, ChannelConfig, Endpoint, Transaction, TransportChannel};
pub use capabilities::{bind, CapabilityTable, FeatureBinding};
pub use error::{BusError, EncodingError, ErrorKind, ProtocolError, SpectroError, SpectroResult};
pub use family::{BusFamily, FeatureFamily, ProtocolFamily};
pub use protocol::{Opcode, Param, Reply, Request, Response, WireProtocol};
