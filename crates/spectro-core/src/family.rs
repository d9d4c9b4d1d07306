//! Value tags used as lookup keys by the capability table.
//!
//! Three closed sets:
//!
//! - [`BusFamily`]: the physical medium a channel runs over
//! - [`ProtocolFamily`]: the wire encoding a protocol instance speaks
//! - [`FeatureFamily`]: the capability category a feature implements
//!
//! None of these carry behaviour; they are compared by value when a device
//! resolves which protocol answers a feature request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical transport medium.
///
/// Fixed for the lifetime of a channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusFamily {
    /// USB bulk endpoints
    Usb,
    /// RS-232 serial line
    Rs232,
    /// TCP socket over Ethernet
    Ethernet,
    /// In-process simulated medium (tests, simulators)
    Loopback,
}

impl BusFamily {
    /// Every bus family, in declaration order.
    pub const ALL: [BusFamily; 4] = [
        BusFamily::Usb,
        BusFamily::Rs232,
        BusFamily::Ethernet,
        BusFamily::Loopback,
    ];

    /// Short label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Usb => "USB",
            Self::Rs232 => "RS-232",
            Self::Ethernet => "Ethernet",
            Self::Loopback => "loopback",
        }
    }
}

impl fmt::Display for BusFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Wire protocol implementation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFamily {
    /// Legacy single-byte opcode command set with fixed-size, unframed replies.
    OoiLegacy,
    /// Framed binary protocol: 44-byte header, length field, CRC-16, footer.
    OceanBinary,
    /// Short serial frames: opcode, length, payload, XOR-8 checksum.
    CompactSerial,
}

impl ProtocolFamily {
    /// Every protocol family, in declaration order.
    pub const ALL: [ProtocolFamily; 3] = [
        ProtocolFamily::OoiLegacy,
        ProtocolFamily::OceanBinary,
        ProtocolFamily::CompactSerial,
    ];

    /// Short label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OoiLegacy => "legacy-OOI",
            Self::OceanBinary => "binary-framed",
            Self::CompactSerial => "compact-serial",
        }
    }

    /// Whether frames of this family carry a checksum field.
    pub fn is_checksummed(&self) -> bool {
        !matches!(self, Self::OoiLegacy)
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Capability category.
///
/// Mirrors the typed feature implementations one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    /// Spectrum acquisition and integration-time control
    Spectrometer,
    /// Thermo-electric cooler
    ThermoElectric,
    /// Strobe/lamp enable line
    Strobe,
    /// Mechanical or electronic shutter
    Shutter,
    /// Calibration EEPROM slots
    Eeprom,
    /// Factory serial number
    SerialNumber,
    /// Integrated light sources
    LightSource,
}

impl FeatureFamily {
    /// Every feature family, in declaration order.
    pub const ALL: [FeatureFamily; 7] = [
        FeatureFamily::Spectrometer,
        FeatureFamily::ThermoElectric,
        FeatureFamily::Strobe,
        FeatureFamily::Shutter,
        FeatureFamily::Eeprom,
        FeatureFamily::SerialNumber,
        FeatureFamily::LightSource,
    ];

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spectrometer => "Spectrometer",
            Self::ThermoElectric => "TEC",
            Self::Strobe => "Strobe",
            Self::Shutter => "Shutter",
            Self::Eeprom => "EEPROM",
            Self::SerialNumber => "Serial Number",
            Self::LightSource => "Light Source",
        }
    }
}

impl fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_legacy_is_unchecksummed() {
        let unchecked: Vec<_> = ProtocolFamily::ALL
            .iter()
            .filter(|p| !p.is_checksummed())
            .collect();
        assert_eq!(unchecked, vec![&ProtocolFamily::OoiLegacy]);
    }

    #[test]
    fn labels_render_in_display() {
        assert_eq!(BusFamily::Rs232.to_string(), "RS-232");
        assert_eq!(FeatureFamily::ThermoElectric.to_string(), "TEC");
        assert_eq!(ProtocolFamily::OceanBinary.to_string(), "binary-framed");
    }
}
