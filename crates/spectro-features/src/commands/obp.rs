//! Ocean binary message types.

use super::{
    ascii, EepromCommands, LightSourceCommands, SerialNumberCommands, ShutterCommands,
    SpectrometerCommands, StrobeCommands, TecCommands,
};
use crate::profile::{SpectrometerProfile, TriggerMode};
use spectro_core::error::{EncodingError, ProtocolError};
use spectro_core::family::ProtocolFamily;
use spectro_core::protocol::{Param, Reply, Request, Response};

const FAMILY: ProtocolFamily = ProtocolFamily::OceanBinary;

/// Message type codes.
#[allow(missing_docs)]
pub mod messages {
    pub const GET_SERIAL_NUMBER: u32 = 0x0010_0000;
    pub const GET_SERIAL_MAX_LENGTH: u32 = 0x0010_0008;
    pub const GET_RAW_SPECTRUM: u32 = 0x0010_1000;
    pub const GET_INTEGRATION_TIME: u32 = 0x0011_0000;
    pub const SET_INTEGRATION_TIME: u32 = 0x0011_0010;
    pub const SET_TRIGGER_MODE: u32 = 0x0011_0110;
    pub const READ_EEPROM_SLOT: u32 = 0x0020_0000;
    pub const SET_LAMP_ENABLE: u32 = 0x0030_0010;
    pub const SET_SHUTTER: u32 = 0x0040_0000;
    pub const READ_TEC_TEMPERATURE: u32 = 0x0042_0004;
    pub const SET_TEC_ENABLE: u32 = 0x0042_0010;
    pub const SET_TEC_SETPOINT: u32 = 0x0042_0011;
    pub const GET_LIGHT_SOURCE_COUNT: u32 = 0x0081_0001;
    pub const SET_LIGHT_SOURCE_ENABLE: u32 = 0x0081_0021;
    pub const SET_LIGHT_SOURCE_INTENSITY: u32 = 0x0081_0031;
}

use messages::*;

/// Command set of the binary-framed family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObpCommands;

fn flag(on: bool) -> Param {
    Param::U8(u8::from(on))
}

impl SpectrometerCommands for ObpCommands {
    fn set_integration(
        &self,
        _profile: &SpectrometerProfile,
        micros: u32,
    ) -> Result<Request, EncodingError> {
        Ok(Request::new(SET_INTEGRATION_TIME).param(Param::U32(micros)))
    }

    fn query_integration(&self) -> Request {
        Request::new(GET_INTEGRATION_TIME).expect(Reply::fixed(4))
    }

    fn parse_integration(
        &self,
        _profile: &SpectrometerProfile,
        response: &Response,
    ) -> Result<u32, ProtocolError> {
        response.u32_le_at(0)
    }

    fn set_trigger_mode(&self, mode: TriggerMode) -> Request {
        Request::new(SET_TRIGGER_MODE).param(Param::U8(mode.code()))
    }

    fn request_spectrum(&self, profile: &SpectrometerProfile) -> Request {
        Request::new(GET_RAW_SPECTRUM)
            .expect(Reply::fixed(profile.pixel_count * profile.pixel_format.width()))
    }
}

impl TecCommands for ObpCommands {
    fn set_enabled(&self, enabled: bool) -> Request {
        Request::new(SET_TEC_ENABLE).param(flag(enabled))
    }

    fn set_setpoint(&self, celsius: f64) -> Request {
        Request::new(SET_TEC_SETPOINT).param(Param::F32(celsius as f32))
    }

    fn query_temperature(&self) -> Request {
        Request::new(READ_TEC_TEMPERATURE).expect(Reply::fixed(4))
    }

    fn parse_temperature(&self, response: &Response) -> Result<f64, ProtocolError> {
        Ok(f64::from(response.f32_le_at(0)?))
    }
}

impl StrobeCommands for ObpCommands {
    fn set_enabled(&self, enabled: bool) -> Request {
        Request::new(SET_LAMP_ENABLE).param(flag(enabled))
    }
}

impl ShutterCommands for ObpCommands {
    fn set_open(&self, open: bool) -> Request {
        Request::new(SET_SHUTTER).param(flag(open))
    }
}

impl EepromCommands for ObpCommands {
    fn read_slot(&self, slot: u8) -> Request {
        Request::new(READ_EEPROM_SLOT)
            .param(Param::U8(slot))
            .expect(Reply::Frame)
    }

    fn slot_data(&self, _slot: u8, response: Response) -> Result<Vec<u8>, ProtocolError> {
        Ok(response.into_payload())
    }
}

impl SerialNumberCommands for ObpCommands {
    fn query_serial(&self) -> Request {
        Request::new(GET_SERIAL_NUMBER).expect(Reply::Frame)
    }

    fn parse_serial(&self, response: Response) -> Result<String, ProtocolError> {
        ascii(FAMILY, response.payload())
    }

    fn query_max_length(&self) -> Option<Request> {
        Some(Request::new(GET_SERIAL_MAX_LENGTH).expect(Reply::fixed(1)))
    }
}

impl LightSourceCommands for ObpCommands {
    fn query_count(&self) -> Request {
        Request::new(GET_LIGHT_SOURCE_COUNT).expect(Reply::fixed(1))
    }

    fn parse_count(&self, response: &Response) -> Result<u8, ProtocolError> {
        response.u8_at(0)
    }

    fn set_enabled(&self, index: u8, enabled: bool) -> Request {
        Request::new(SET_LIGHT_SOURCE_ENABLE)
            .param(Param::U8(index))
            .param(flag(enabled))
    }

    fn set_intensity(&self, index: u8, fraction: f32) -> Request {
        Request::new(SET_LIGHT_SOURCE_INTENSITY)
            .param(Param::U8(index))
            .param(Param::F32(fraction))
    }
}
