//! Device configuration.
//!
//! A TOML file lists the devices to open and the default timeouts. Values
//! may be overridden from the environment with the `SPECTRO_` prefix, nested
//! keys separated by `__` (for example `SPECTRO_TIMEOUTS__READ_TIMEOUT_MS`).
//!
//! ```toml
//! [timeouts]
//! read_timeout_ms = 1000
//!
//! [[devices]]
//! id = "bench"
//! model = "SSM-100"
//! transport = { type = "serial", port = "/dev/ttyUSB0", baud_rate = 115200 }
//! ```

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, ConfigLoadError};
pub use schema::{DeviceEntry, SpectroConfig, TimeoutSettings, TransportConfig};
