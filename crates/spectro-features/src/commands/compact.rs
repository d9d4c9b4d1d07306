//! Compact serial opcodes. Integration time travels in µs as a 16-bit field.

use super::{ascii, EepromCommands, SerialNumberCommands, ShutterCommands, SpectrometerCommands};
use crate::profile::{SpectrometerProfile, TriggerMode};
use spectro_core::error::{EncodingError, ProtocolError};
use spectro_core::family::ProtocolFamily;
use spectro_core::protocol::{Param, Reply, Request, Response};

const FAMILY: ProtocolFamily = ProtocolFamily::CompactSerial;

const GET_INTEGRATION_TIME: u32 = 0x01;
const SET_INTEGRATION_TIME: u32 = 0x02;
const SET_TRIGGER_MODE: u32 = 0x03;
const GET_SPECTRUM: u32 = 0x04;
const GET_SERIAL_NUMBER: u32 = 0x05;
const SET_SHUTTER: u32 = 0x06;
const READ_EEPROM_SLOT: u32 = 0x07;

/// Serial number field width.
pub const SERIAL_LEN: usize = 16;

/// Command set of the compact serial family.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactCommands;

impl SpectrometerCommands for CompactCommands {
    fn set_integration(
        &self,
        _profile: &SpectrometerProfile,
        micros: u32,
    ) -> Result<Request, EncodingError> {
        // Narrowed by the encoder, which rejects values above 0xFFFF.
        Ok(Request::new(SET_INTEGRATION_TIME).param(Param::U32(micros)))
    }

    fn query_integration(&self) -> Request {
        Request::new(GET_INTEGRATION_TIME).expect(Reply::fixed(2))
    }

    fn parse_integration(
        &self,
        _profile: &SpectrometerProfile,
        response: &Response,
    ) -> Result<u32, ProtocolError> {
        Ok(u32::from(response.u16_be_at(0)?))
    }

    fn set_trigger_mode(&self, mode: TriggerMode) -> Request {
        Request::new(SET_TRIGGER_MODE).param(Param::U8(mode.code()))
    }

    fn request_spectrum(&self, profile: &SpectrometerProfile) -> Request {
        Request::new(GET_SPECTRUM)
            .expect(Reply::fixed(profile.pixel_count * profile.pixel_format.width()))
    }
}

impl ShutterCommands for CompactCommands {
    fn set_open(&self, open: bool) -> Request {
        Request::new(SET_SHUTTER).param(Param::U8(u8::from(open)))
    }
}

impl EepromCommands for CompactCommands {
    fn read_slot(&self, slot: u8) -> Request {
        Request::new(READ_EEPROM_SLOT)
            .param(Param::U8(slot))
            .expect(Reply::Frame)
    }

    fn slot_data(&self, _slot: u8, response: Response) -> Result<Vec<u8>, ProtocolError> {
        Ok(response.into_payload())
    }
}

impl SerialNumberCommands for CompactCommands {
    fn query_serial(&self) -> Request {
        Request::new(GET_SERIAL_NUMBER).expect(Reply::Frame)
    }

    fn parse_serial(&self, response: Response) -> Result<String, ProtocolError> {
        if response.payload().len() > SERIAL_LEN {
            return Err(ProtocolError::malformed(
                FAMILY,
                format!("serial number of {} bytes", response.payload().len()),
            ));
        }
        ascii(FAMILY, response.payload())
    }

    fn query_max_length(&self) -> Option<Request> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectro_core::protocol::{Opcode, WireProtocol};
    use spectro_protocol::CompactSerial;

    #[test]
    fn integration_request_encodes_big_endian() {
        let profile = crate::profile::SpectrometerProfile {
            pixel_count: 100,
            pixel_format: crate::profile::PixelFormat::U16Be,
            integration_unit: crate::profile::IntegrationUnit::Micros,
            integration_min_micros: 10,
            integration_max_micros: 65_535,
            max_intensity: 65_535.0,
            trigger_modes: &[TriggerMode::Normal],
            spectrum_on_data_endpoint: false,
        };
        let req = CompactCommands.set_integration(&profile, 100).unwrap();
        assert_eq!(
            CompactSerial.encode(&req).unwrap(),
            vec![0x02, 0x02, 0x00, 0x64, 0x64]
        );
        assert_eq!(CompactCommands.request_spectrum(&profile).reply, Reply::fixed(200));
    }

    #[test]
    fn oversized_serial_is_malformed() {
        let resp = Response::new(FAMILY, Opcode(GET_SERIAL_NUMBER), vec![b'A'; 17]);
        assert!(CompactCommands.parse_serial(resp).is_err());
    }
}
