//! Configuration types.

use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use spectro_core::bus::ChannelConfig;
use spectro_core::family::BusFamily;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SpectroConfig {
    /// Default channel timeouts
    #[serde(default)]
    #[validate]
    pub timeouts: TimeoutSettings,

    /// Devices to open
    #[serde(default)]
    #[validate]
    pub devices: Vec<DeviceEntry>,
}

impl SpectroConfig {
    /// Entry with id `id`.
    pub fn device(&self, id: &str) -> Option<&DeviceEntry> {
        self.devices.iter().find(|d| d.id == id)
    }
}

/// Channel timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSettings {
    /// Default read deadline (1-60000)
    #[serde(default = "default_timeout_ms")]
    #[validate(minimum = 1)]
    #[validate(maximum = 60000)]
    pub read_timeout_ms: u64,

    /// Write deadline (1-60000)
    #[serde(default = "default_timeout_ms")]
    #[validate(minimum = 1)]
    #[validate(maximum = 60000)]
    pub write_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

impl TimeoutSettings {
    /// Channel settings, with `read_override_ms` replacing the default read
    /// deadline when given.
    pub fn channel_config(&self, read_override_ms: Option<u64>) -> ChannelConfig {
        ChannelConfig {
            read_timeout: Duration::from_millis(read_override_ms.unwrap_or(self.read_timeout_ms)),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            clear_on_open: true,
        }
    }
}

/// One device to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    /// Unique identifier
    #[validate(min_length = 1)]
    #[validate(max_length = 64)]
    pub id: String,

    /// Catalog model name
    #[validate(min_length = 1)]
    pub model: String,

    /// How to reach it
    pub transport: TransportConfig,

    /// Read deadline override (1-60000)
    #[serde(default)]
    #[validate(minimum = 1)]
    #[validate(maximum = 60000)]
    pub timeout_ms: Option<u64>,
}

/// Transport selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// RS-232 port
    Serial {
        /// Port path (`/dev/ttyUSB0`, `COM3`)
        port: String,
        /// Baud rate (300-921600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// TCP socket
    Tcp {
        /// Host name or address
        host: String,
        /// TCP port
        port: u16,
    },
    /// USB, matched by the model's product id
    Usb {
        /// USB serial number string, to pick one of several identical units
        #[serde(default)]
        serial_number: Option<String>,
    },
}

fn default_baud_rate() -> u32 {
    9600
}

impl TransportConfig {
    /// Medium this transport opens.
    pub fn bus(&self) -> BusFamily {
        match self {
            Self::Serial { .. } => BusFamily::Rs232,
            Self::Tcp { .. } => BusFamily::Ethernet,
            Self::Usb { .. } => BusFamily::Usb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_tags_parse() {
        let entry: DeviceEntry = toml::from_str(
            r#"
            id = "lab"
            model = "Jaz"
            transport = { type = "tcp", host = "10.0.0.7", port = 7654 }
            "#,
        )
        .unwrap();
        assert_eq!(entry.transport.bus(), BusFamily::Ethernet);
        assert_eq!(entry.timeout_ms, None);
    }

    #[test]
    fn override_replaces_read_timeout_only() {
        let cfg = TimeoutSettings::default().channel_config(Some(250));
        assert_eq!(cfg.read_timeout, Duration::from_millis(250));
        assert_eq!(cfg.write_timeout, Duration::from_millis(1000));
    }
}
