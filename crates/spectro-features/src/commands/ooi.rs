//! Legacy OOI opcodes.

use super::{
    ascii, EepromCommands, SerialNumberCommands, SpectrometerCommands, StrobeCommands,
    TecCommands,
};
use crate::profile::{IntegrationUnit, SpectrometerProfile, TriggerMode};
use spectro_core::bus::Endpoint;
use spectro_core::error::{EncodingError, ProtocolError};
use spectro_core::family::ProtocolFamily;
use spectro_core::protocol::{Param, Reply, Request, Response};
use spectro_protocol::ooi::SYNC_BYTE;

const FAMILY: ProtocolFamily = ProtocolFamily::OoiLegacy;

const SET_INTEGRATION: u32 = 0x02;
const SET_STROBE: u32 = 0x03;
const QUERY_INFO: u32 = 0x05;
const REQUEST_SPECTRUM: u32 = 0x09;
const SET_TRIGGER_MODE: u32 = 0x0A;
const TEC_ENABLE: u32 = 0x71;
const TEC_READ: u32 = 0x72;
const TEC_SETPOINT: u32 = 0x73;
const QUERY_STATUS: u32 = 0xFE;

/// Query-information replies: echoed opcode, slot byte, 15 data bytes.
const INFO_REPLY_LEN: usize = 17;
/// Data bytes in one information slot.
pub const INFO_DATA_LEN: usize = 15;
const STATUS_REPLY_LEN: usize = 16;
/// Offset of the integration time inside the status block.
const STATUS_INTEGRATION_AT: usize = 2;

/// Command set of the legacy OOI family.
#[derive(Debug, Clone, Copy, Default)]
pub struct OoiCommands;

fn flag(on: bool) -> Param {
    Param::U16(u16::from(on))
}

impl SpectrometerCommands for OoiCommands {
    fn set_integration(
        &self,
        profile: &SpectrometerProfile,
        micros: u32,
    ) -> Result<Request, EncodingError> {
        let param = match profile.integration_unit {
            IntegrationUnit::Millis => {
                let millis = micros / 1000;
                let field = u16::try_from(millis).map_err(|_| EncodingError::ParameterOutOfRange {
                    protocol: FAMILY,
                    index: 0,
                    value: u64::from(millis),
                    max: u64::from(u16::MAX),
                })?;
                Param::U16(field)
            }
            IntegrationUnit::Micros => Param::U32(micros),
        };
        Ok(Request::new(SET_INTEGRATION).param(param))
    }

    fn query_integration(&self) -> Request {
        Request::new(QUERY_STATUS).expect(Reply::fixed(STATUS_REPLY_LEN))
    }

    fn parse_integration(
        &self,
        profile: &SpectrometerProfile,
        response: &Response,
    ) -> Result<u32, ProtocolError> {
        match profile.integration_unit {
            IntegrationUnit::Millis => {
                Ok(u32::from(response.u16_le_at(STATUS_INTEGRATION_AT)?) * 1000)
            }
            IntegrationUnit::Micros => response.u32_le_at(STATUS_INTEGRATION_AT),
        }
    }

    fn set_trigger_mode(&self, mode: TriggerMode) -> Request {
        Request::new(SET_TRIGGER_MODE).param(Param::U16(u16::from(mode.code())))
    }

    fn request_spectrum(&self, profile: &SpectrometerProfile) -> Request {
        let endpoint = if profile.spectrum_on_data_endpoint {
            Endpoint::Data
        } else {
            Endpoint::Control
        };
        Request::new(REQUEST_SPECTRUM)
            .expect(Reply::Fixed {
                len: profile.pixel_count * profile.pixel_format.width(),
                echo: false,
                sync: Some(SYNC_BYTE),
            })
            .reply_on(endpoint)
    }
}

impl TecCommands for OoiCommands {
    fn set_enabled(&self, enabled: bool) -> Request {
        Request::new(TEC_ENABLE).param(flag(enabled))
    }

    fn set_setpoint(&self, celsius: f64) -> Request {
        // Tenths of a degree, two's complement.
        let tenths = (celsius * 10.0).round() as i16;
        Request::new(TEC_SETPOINT).param(Param::U16(tenths as u16))
    }

    fn query_temperature(&self) -> Request {
        Request::new(TEC_READ).expect(Reply::Fixed {
            len: 3,
            echo: true,
            sync: None,
        })
    }

    fn parse_temperature(&self, response: &Response) -> Result<f64, ProtocolError> {
        let tenths = response.u16_le_at(0)? as i16;
        Ok(f64::from(tenths) / 10.0)
    }
}

impl StrobeCommands for OoiCommands {
    fn set_enabled(&self, enabled: bool) -> Request {
        Request::new(SET_STROBE).param(flag(enabled))
    }
}

impl EepromCommands for OoiCommands {
    fn read_slot(&self, slot: u8) -> Request {
        Request::new(QUERY_INFO)
            .param(Param::U8(slot))
            .expect(Reply::Fixed {
                len: INFO_REPLY_LEN,
                echo: true,
                sync: None,
            })
    }

    fn slot_data(&self, slot: u8, response: Response) -> Result<Vec<u8>, ProtocolError> {
        let echoed = response.u8_at(0)?;
        if echoed != slot {
            return Err(ProtocolError::malformed(
                FAMILY,
                format!("information reply is for slot {}, expected {}", echoed, slot),
            ));
        }
        let mut data = response.into_payload();
        data.remove(0);
        Ok(data)
    }
}

impl SerialNumberCommands for OoiCommands {
    fn query_serial(&self) -> Request {
        self.read_slot(0)
    }

    fn parse_serial(&self, response: Response) -> Result<String, ProtocolError> {
        let data = self.slot_data(0, response)?;
        ascii(FAMILY, &data)
    }

    fn query_max_length(&self) -> Option<Request> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PixelFormat;
    use spectro_core::protocol::{Opcode, WireProtocol};
    use spectro_protocol::OoiLegacy;

    const PROFILE: SpectrometerProfile = SpectrometerProfile {
        pixel_count: 4,
        pixel_format: PixelFormat::U16Le,
        integration_unit: IntegrationUnit::Millis,
        integration_min_micros: 3_000,
        integration_max_micros: 65_535_000,
        max_intensity: 4095.0,
        trigger_modes: &[TriggerMode::Normal],
        spectrum_on_data_endpoint: true,
    };

    #[test]
    fn millisecond_models_get_u16_millis() {
        let req = OoiCommands.set_integration(&PROFILE, 100_000).unwrap();
        assert_eq!(OoiLegacy.encode(&req).unwrap(), vec![0x02, 100, 0]);
    }

    #[test]
    fn millisecond_overflow_is_an_encoding_error() {
        let err = OoiCommands.set_integration(&PROFILE, 65_536_000).unwrap_err();
        assert!(matches!(
            err,
            EncodingError::ParameterOutOfRange {
                value: 65_536,
                max: 65_535,
                ..
            }
        ));
    }

    #[test]
    fn spectrum_request_reads_data_endpoint_with_sync() {
        let req = OoiCommands.request_spectrum(&PROFILE);
        assert_eq!(req.reply_endpoint, Endpoint::Data);
        assert_eq!(
            req.reply,
            Reply::Fixed {
                len: 8,
                echo: false,
                sync: Some(0x69)
            }
        );
    }

    #[test]
    fn negative_setpoint_is_twos_complement_tenths() {
        let req = TecCommands::set_setpoint(&OoiCommands, -15.0);
        assert_eq!(OoiLegacy.encode(&req).unwrap(), vec![0x73, 0x6A, 0xFF]);
    }

    #[test]
    fn slot_echo_is_checked() {
        let resp = Response::new(FAMILY, Opcode(QUERY_INFO), vec![3, b'x']);
        assert!(OoiCommands.slot_data(4, resp.clone()).is_err());
        assert_eq!(OoiCommands.slot_data(3, resp).unwrap(), vec![b'x']);
    }
}
