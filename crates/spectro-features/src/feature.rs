//! The closed set of feature implementations a device can carry.

use crate::commands;
use crate::context::FeatureContext;
use crate::eeprom::Eeprom;
use crate::light_source::LightSource;
use crate::serial_number::SerialNumber;
use crate::shutter::Shutter;
use crate::spectrometer::Spectrometer;
use crate::strobe::Strobe;
use crate::tec::ThermoElectric;
use spectro_core::error::{SpectroError, SpectroResult};
use spectro_core::family::{FeatureFamily, ProtocolFamily};

/// One installed feature implementation.
#[derive(Debug)]
pub enum Feature {
    /// Spectrum acquisition
    Spectrometer(Spectrometer),
    /// Thermo-electric cooler
    ThermoElectric(ThermoElectric),
    /// Strobe/lamp line
    Strobe(Strobe),
    /// Shutter
    Shutter(Shutter),
    /// Calibration EEPROM
    Eeprom(Eeprom),
    /// Serial number
    SerialNumber(SerialNumber),
    /// Light sources
    LightSource(LightSource),
}

fn missing(ctx: &FeatureContext, family: FeatureFamily) -> SpectroError {
    SpectroError::Configuration(format!(
        "{} binds {} to {}, which has no command set for it",
        ctx.profile().name,
        family,
        ctx.protocol_family()
    ))
}

impl Feature {
    /// Build the `family` implementation on `ctx`.
    ///
    /// # Errors
    ///
    /// [`SpectroError::Configuration`] when the context's protocol has no
    /// command set for `family`.
    pub fn build(family: FeatureFamily, ctx: FeatureContext) -> SpectroResult<Self> {
        let protocol = ctx.protocol_family();
        let feature = match family {
            FeatureFamily::Spectrometer => match commands::spectrometer(protocol) {
                Some(c) => Self::Spectrometer(Spectrometer::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
            FeatureFamily::ThermoElectric => match commands::tec(protocol) {
                Some(c) => Self::ThermoElectric(ThermoElectric::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
            FeatureFamily::Strobe => match commands::strobe(protocol) {
                Some(c) => Self::Strobe(Strobe::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
            FeatureFamily::Shutter => match commands::shutter(protocol) {
                Some(c) => Self::Shutter(Shutter::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
            FeatureFamily::Eeprom => match commands::eeprom(protocol) {
                Some(c) => Self::Eeprom(Eeprom::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
            FeatureFamily::SerialNumber => match commands::serial_number(protocol) {
                Some(c) => Self::SerialNumber(SerialNumber::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
            FeatureFamily::LightSource => match commands::light_source(protocol) {
                Some(c) => Self::LightSource(LightSource::new(ctx, c)),
                None => return Err(missing(&ctx, family)),
            },
        };
        Ok(feature)
    }

    /// Feature family of this implementation.
    pub fn family(&self) -> FeatureFamily {
        match self {
            Self::Spectrometer(_) => FeatureFamily::Spectrometer,
            Self::ThermoElectric(_) => FeatureFamily::ThermoElectric,
            Self::Strobe(_) => FeatureFamily::Strobe,
            Self::Shutter(_) => FeatureFamily::Shutter,
            Self::Eeprom(_) => FeatureFamily::Eeprom,
            Self::SerialNumber(_) => FeatureFamily::SerialNumber,
            Self::LightSource(_) => FeatureFamily::LightSource,
        }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        match self {
            Self::Spectrometer(f) => f.protocol(),
            Self::ThermoElectric(f) => f.protocol(),
            Self::Strobe(f) => f.protocol(),
            Self::Shutter(f) => f.protocol(),
            Self::Eeprom(f) => f.protocol(),
            Self::SerialNumber(f) => f.protocol(),
            Self::LightSource(f) => f.protocol(),
        }
    }

    /// The spectrometer, if this is one.
    pub fn as_spectrometer(&self) -> Option<&Spectrometer> {
        match self {
            Self::Spectrometer(f) => Some(f),
            _ => None,
        }
    }

    /// The TEC, if this is one.
    pub fn as_thermo_electric(&self) -> Option<&ThermoElectric> {
        match self {
            Self::ThermoElectric(f) => Some(f),
            _ => None,
        }
    }

    /// The strobe, if this is one.
    pub fn as_strobe(&self) -> Option<&Strobe> {
        match self {
            Self::Strobe(f) => Some(f),
            _ => None,
        }
    }

    /// The shutter, if this is one.
    pub fn as_shutter(&self) -> Option<&Shutter> {
        match self {
            Self::Shutter(f) => Some(f),
            _ => None,
        }
    }

    /// The EEPROM, if this is one.
    pub fn as_eeprom(&self) -> Option<&Eeprom> {
        match self {
            Self::Eeprom(f) => Some(f),
            _ => None,
        }
    }

    /// The serial number feature, if this is one.
    pub fn as_serial_number(&self) -> Option<&SerialNumber> {
        match self {
            Self::SerialNumber(f) => Some(f),
            _ => None,
        }
    }

    /// The light sources, if this is one.
    pub fn as_light_source(&self) -> Option<&LightSource> {
        match self {
            Self::LightSource(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use spectro_core::error::ErrorKind;
    use spectro_core::family::BusFamily;

    #[test]
    fn builds_every_family_the_protocol_covers() {
        for family in FeatureFamily::ALL {
            let (ctx, _device) =
                testing::context(BusFamily::Usb, ProtocolFamily::OceanBinary, &testing::BINARY);
            let feature = Feature::build(family, ctx).unwrap();
            assert_eq!(feature.family(), family);
            assert_eq!(feature.protocol(), ProtocolFamily::OceanBinary);
        }
    }

    #[test]
    fn missing_command_set_is_a_configuration_error() {
        let (ctx, _device) =
            testing::context(BusFamily::Rs232, ProtocolFamily::CompactSerial, &testing::COMPACT);
        let err = Feature::build(FeatureFamily::ThermoElectric, ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn accessors_match_variant() {
        let (ctx, _device) =
            testing::context(BusFamily::Usb, ProtocolFamily::OoiLegacy, &testing::LEGACY);
        let feature = Feature::build(FeatureFamily::Spectrometer, ctx).unwrap();
        assert!(feature.as_spectrometer().is_some());
        assert!(feature.as_thermo_electric().is_none());
    }
}
