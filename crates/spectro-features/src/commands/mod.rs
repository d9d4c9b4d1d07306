//! Per-protocol command sets.
//!
//! A command set knows the opcodes and parameter layouts one protocol family
//! uses for one feature family, and how to pull typed values out of the
//! replies. Features hold a `&'static dyn` command set chosen by
//! [`ProtocolFamily`] when the device is built, so no feature ever matches on
//! the protocol itself.
//!
//! | Feature | legacy-OOI | binary-framed | compact-serial |
//! |---|---|---|---|
//! | Spectrometer | ✓ | ✓ | ✓ |
//! | TEC | ✓ | ✓ | |
//! | Strobe | ✓ | ✓ | |
//! | Shutter | | ✓ | ✓ |
//! | EEPROM | ✓ | ✓ | ✓ |
//! | Serial Number | ✓ | ✓ | ✓ |
//! | Light Source | | ✓ | |

pub mod compact;
pub mod obp;
pub mod ooi;

use crate::profile::{SpectrometerProfile, TriggerMode};
use spectro_core::error::{EncodingError, ProtocolError};
use spectro_core::family::ProtocolFamily;
use spectro_core::protocol::{Request, Response};
use std::fmt;

use compact::CompactCommands;
use obp::ObpCommands;
use ooi::OoiCommands;

/// Spectrum acquisition and integration-time control.
pub trait SpectrometerCommands: Send + Sync + fmt::Debug {
    /// Set the integration time. `micros` is already range-checked and a
    /// multiple of the profile's integration step.
    fn set_integration(
        &self,
        profile: &SpectrometerProfile,
        micros: u32,
    ) -> Result<Request, EncodingError>;

    /// Ask the device for its current integration time.
    fn query_integration(&self) -> Request;

    /// Integration time in µs from the reply to [`query_integration`](Self::query_integration).
    fn parse_integration(
        &self,
        profile: &SpectrometerProfile,
        response: &Response,
    ) -> Result<u32, ProtocolError>;

    /// Select a trigger mode.
    fn set_trigger_mode(&self, mode: TriggerMode) -> Request;

    /// Request one spectrum; the reply payload is the raw pixel data.
    fn request_spectrum(&self, profile: &SpectrometerProfile) -> Request;
}

/// Thermo-electric cooler.
pub trait TecCommands: Send + Sync + fmt::Debug {
    /// Switch the cooler on or off.
    fn set_enabled(&self, enabled: bool) -> Request;

    /// Set the target temperature. `celsius` is already range-checked.
    fn set_setpoint(&self, celsius: f64) -> Request;

    /// Ask for the detector temperature.
    fn query_temperature(&self) -> Request;

    /// Temperature in °C from the reply to [`query_temperature`](Self::query_temperature).
    fn parse_temperature(&self, response: &Response) -> Result<f64, ProtocolError>;
}

/// Strobe/lamp enable line.
pub trait StrobeCommands: Send + Sync + fmt::Debug {
    /// Enable or disable the strobe output.
    fn set_enabled(&self, enabled: bool) -> Request;
}

/// Shutter.
pub trait ShutterCommands: Send + Sync + fmt::Debug {
    /// Open or close the shutter.
    fn set_open(&self, open: bool) -> Request;
}

/// Calibration EEPROM.
pub trait EepromCommands: Send + Sync + fmt::Debug {
    /// Ask for the contents of `slot`.
    fn read_slot(&self, slot: u8) -> Request;

    /// Slot contents from the reply to [`read_slot`](Self::read_slot).
    fn slot_data(&self, slot: u8, response: Response) -> Result<Vec<u8>, ProtocolError>;
}

/// Factory serial number.
pub trait SerialNumberCommands: Send + Sync + fmt::Debug {
    /// Ask for the serial number.
    fn query_serial(&self) -> Request;

    /// Serial number from the reply to [`query_serial`](Self::query_serial).
    fn parse_serial(&self, response: Response) -> Result<String, ProtocolError>;

    /// Ask for the longest serial number the firmware can report, if the
    /// family has a command for it.
    fn query_max_length(&self) -> Option<Request>;

    /// Length from the reply to [`query_max_length`](Self::query_max_length).
    fn parse_max_length(&self, response: &Response) -> Result<usize, ProtocolError> {
        Ok(usize::from(response.u8_at(0)?))
    }
}

/// Integrated light sources.
pub trait LightSourceCommands: Send + Sync + fmt::Debug {
    /// Ask how many light sources are fitted.
    fn query_count(&self) -> Request;

    /// Count from the reply to [`query_count`](Self::query_count).
    fn parse_count(&self, response: &Response) -> Result<u8, ProtocolError>;

    /// Switch light source `index` on or off.
    fn set_enabled(&self, index: u8, enabled: bool) -> Request;

    /// Set light source `index` to `fraction` of full intensity (0.0..=1.0).
    fn set_intensity(&self, index: u8, fraction: f32) -> Request;
}

/// Spectrometer command set of `family`.
pub fn spectrometer(family: ProtocolFamily) -> Option<&'static dyn SpectrometerCommands> {
    match family {
        ProtocolFamily::OoiLegacy => Some(&OoiCommands),
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::CompactSerial => Some(&CompactCommands),
    }
}

/// TEC command set of `family`.
pub fn tec(family: ProtocolFamily) -> Option<&'static dyn TecCommands> {
    match family {
        ProtocolFamily::OoiLegacy => Some(&OoiCommands),
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::CompactSerial => None,
    }
}

/// Strobe command set of `family`.
pub fn strobe(family: ProtocolFamily) -> Option<&'static dyn StrobeCommands> {
    match family {
        ProtocolFamily::OoiLegacy => Some(&OoiCommands),
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::CompactSerial => None,
    }
}

/// Shutter command set of `family`.
pub fn shutter(family: ProtocolFamily) -> Option<&'static dyn ShutterCommands> {
    match family {
        ProtocolFamily::OoiLegacy => None,
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::CompactSerial => Some(&CompactCommands),
    }
}

/// EEPROM command set of `family`.
pub fn eeprom(family: ProtocolFamily) -> Option<&'static dyn EepromCommands> {
    match family {
        ProtocolFamily::OoiLegacy => Some(&OoiCommands),
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::CompactSerial => Some(&CompactCommands),
    }
}

/// Serial number command set of `family`.
pub fn serial_number(family: ProtocolFamily) -> Option<&'static dyn SerialNumberCommands> {
    match family {
        ProtocolFamily::OoiLegacy => Some(&OoiCommands),
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::CompactSerial => Some(&CompactCommands),
    }
}

/// Light source command set of `family`.
pub fn light_source(family: ProtocolFamily) -> Option<&'static dyn LightSourceCommands> {
    match family {
        ProtocolFamily::OceanBinary => Some(&ObpCommands),
        ProtocolFamily::OoiLegacy | ProtocolFamily::CompactSerial => None,
    }
}

/// NUL-terminated ASCII text, trimmed.
pub(crate) fn ascii(protocol: ProtocolFamily, bytes: &[u8]) -> Result<String, ProtocolError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = &bytes[..end];
    if !text.is_ascii() {
        return Err(ProtocolError::malformed(protocol, "text field is not ASCII"));
    }
    Ok(String::from_utf8_lossy(text).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_matches_table() {
        use ProtocolFamily::*;
        assert!(tec(CompactSerial).is_none());
        assert!(shutter(OoiLegacy).is_none());
        assert!(light_source(OoiLegacy).is_none());
        for family in ProtocolFamily::ALL {
            assert!(spectrometer(family).is_some());
            assert!(eeprom(family).is_some());
            assert!(serial_number(family).is_some());
        }
    }

    #[test]
    fn ascii_stops_at_nul_and_rejects_binary() {
        assert_eq!(ascii(ProtocolFamily::OoiLegacy, b" QE12345\0xx").unwrap(), "QE12345");
        assert!(ascii(ProtocolFamily::OoiLegacy, &[0xC3, 0xA9]).is_err());
    }
}
