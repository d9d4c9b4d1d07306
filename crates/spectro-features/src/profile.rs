//! Static per-model parameters the features need for unit conversion and
//! argument checking.
//!
//! Profiles are declared as `const` items next to each model's capability
//! bindings and handed to features as `&'static ModelProfile`.

use serde::{Deserialize, Serialize};
use spectro_core::error::ProtocolError;
use spectro_core::family::ProtocolFamily;

/// Unit the firmware expects for integration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationUnit {
    /// Whole milliseconds
    Millis,
    /// Microseconds
    Micros,
}

impl IntegrationUnit {
    /// Smallest representable step, µs.
    pub const fn step_micros(self) -> u32 {
        match self {
            Self::Millis => 1000,
            Self::Micros => 1,
        }
    }
}

/// How raw spectrum bytes map to pixel counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 16-bit little-endian
    U16Le,
    /// 16-bit little-endian with bit 13 inverted by the detector ADC
    U16LeMsbFlip,
    /// 16-bit big-endian
    U16Be,
    /// 32-bit little-endian
    U32Le,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn width(self) -> usize {
        match self {
            Self::U16Le | Self::U16LeMsbFlip | Self::U16Be => 2,
            Self::U32Le => 4,
        }
    }

    /// Decode exactly `pixels` values from `raw`.
    pub fn decode(
        self,
        protocol: ProtocolFamily,
        raw: &[u8],
        pixels: usize,
    ) -> Result<Vec<f64>, ProtocolError> {
        let expected = pixels * self.width();
        if raw.len() != expected {
            return Err(ProtocolError::malformed(
                protocol,
                format!("spectrum is {} bytes, expected {}", raw.len(), expected),
            ));
        }
        let values = match self {
            Self::U16Le => raw
                .chunks_exact(2)
                .map(|c| f64::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            Self::U16LeMsbFlip => raw
                .chunks_exact(2)
                .map(|c| f64::from(u16::from_le_bytes([c[0], c[1]]) ^ 0x2000))
                .collect(),
            Self::U16Be => raw
                .chunks_exact(2)
                .map(|c| f64::from(u16::from_be_bytes([c[0], c[1]])))
                .collect(),
            Self::U32Le => raw
                .chunks_exact(4)
                .map(|c| f64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        };
        Ok(values)
    }
}

/// Acquisition trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Free-running acquisition
    Normal,
    /// Acquisition started by software request
    Software,
    /// External level trigger
    ExternalLevel,
    /// External edge trigger
    ExternalEdge,
}

impl TriggerMode {
    /// Firmware code of the mode.
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Software => 1,
            Self::ExternalLevel => 2,
            Self::ExternalEdge => 3,
        }
    }
}

/// Detector parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrometerProfile {
    /// Number of detector pixels
    pub pixel_count: usize,
    /// Wire encoding of one pixel
    pub pixel_format: PixelFormat,
    /// Unit of the integration-time command parameter
    pub integration_unit: IntegrationUnit,
    /// Shortest integration time, µs
    pub integration_min_micros: u32,
    /// Longest integration time, µs
    pub integration_max_micros: u32,
    /// Saturation level in counts
    pub max_intensity: f64,
    /// Trigger modes the firmware accepts
    pub trigger_modes: &'static [TriggerMode],
    /// Spectra arrive on the bulk data endpoint instead of the command endpoint
    pub spectrum_on_data_endpoint: bool,
}

/// Thermo-electric cooler limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TecProfile {
    /// Lowest accepted setpoint, °C
    pub min_setpoint_celsius: f64,
    /// Highest accepted setpoint, °C
    pub max_setpoint_celsius: f64,
}

/// Everything a feature may need to know about the model it talks to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    /// Model name, as used in error messages
    pub name: &'static str,
    /// Detector parameters
    pub spectrometer: SpectrometerProfile,
    /// Cooler limits, for models with a TEC
    pub tec: Option<TecProfile>,
    /// Number of readable EEPROM slots
    pub eeprom_slots: u8,
    /// Longest serial number the firmware reports
    pub serial_max_len: usize,
    /// Number of integrated light sources
    pub light_sources: u8,
}
