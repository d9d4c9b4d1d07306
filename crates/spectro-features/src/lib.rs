//! `spectro-features`
//!
//! Typed feature implementations. Each one wraps a [`FeatureContext`] (bus,
//! protocol instance, model profile) and a static per-protocol command set
//! from [`commands`], and maps every operation onto one or a few
//! [`execute`](spectro_core::protocol::WireProtocol::execute) calls. Unit
//! conversion and argument checking against the model profile happen here;
//! failures from the exchange are returned unchanged.
//!
//! [`Feature`] is the closed set a device installs.

pub mod commands;
pub mod context;
pub mod eeprom;
pub mod feature;
pub mod light_source;
pub mod profile;
pub mod serial_number;
pub mod shutter;
pub mod spectrometer;
pub mod strobe;
pub mod tec;

pub use context::FeatureContext;
pub use eeprom::Eeprom;
pub use feature::Feature;
pub use light_source::LightSource;
pub use profile::{
    IntegrationUnit, ModelProfile, PixelFormat, SpectrometerProfile, TecProfile, TriggerMode,
};
pub use serial_number::SerialNumber;
pub use shutter::Shutter;
pub use spectrometer::Spectrometer;
pub use strobe::Strobe;
pub use tec::ThermoElectric;
