//! `spectro-devices`
//!
//! The model catalog and everything needed to turn a configuration entry into
//! a working [`Device`]:
//!
//! - [`models`]: static descriptors (capability bindings, profile, USB identity)
//! - [`device`]: binds a model to one opened bus and installs its features
//! - [`config`]: TOML + environment configuration, validated on load
//! - [`registry`]: opens configured devices and keeps them by id
//!
//! ```rust
//! use spectro_bus::mock;
//! use spectro_core::bus::Bus;
//! use spectro_core::family::BusFamily;
//! use spectro_devices::{models, Device};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let (channel, instrument) = mock::pair_on(BusFamily::Rs232);
//! let bus = Bus::from_channel(Box::new(channel), Duration::from_millis(200)).unwrap();
//! let device = Device::new(&models::SSM_100, Arc::new(bus)).unwrap();
//!
//! instrument.expect_and_respond(&[0x01, 0x00, 0x01], &[0x01, 0x02, 0x00, 0x64, 0x67]);
//! let micros = device.spectrometer().unwrap().integration_time_micros().unwrap();
//! assert_eq!(micros, 100);
//! ```

pub mod config;
pub mod device;
pub mod models;
pub mod registry;

pub use config::{load_config, SpectroConfig};
pub use device::Device;
pub use models::ModelDescriptor;
pub use registry::{open_device, DeviceInfo, DeviceRegistry};
