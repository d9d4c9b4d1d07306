//! The same typed operation driven over each protocol family.

use spectro_bus::mock::{self, MockDevice};
use spectro_core::bus::Bus;
use spectro_core::error::ErrorKind;
use spectro_core::family::{BusFamily, FeatureFamily, ProtocolFamily};
use spectro_core::protocol::{Param, Reply, Request, WireProtocol};
use spectro_features::{
    Feature, FeatureContext, IntegrationUnit, ModelProfile, PixelFormat, SpectrometerProfile,
    TriggerMode,
};
use std::sync::Arc;
use std::time::Duration;

const PROFILE: ModelProfile = ModelProfile {
    name: "BENCH",
    spectrometer: SpectrometerProfile {
        pixel_count: 3,
        pixel_format: PixelFormat::U16Be,
        integration_unit: IntegrationUnit::Micros,
        integration_min_micros: 10,
        integration_max_micros: 65_535,
        max_intensity: 65_535.0,
        trigger_modes: &[TriggerMode::Normal],
        spectrum_on_data_endpoint: false,
    },
    tec: None,
    eeprom_slots: 4,
    serial_max_len: 16,
    light_sources: 0,
};

fn spectrometer(protocol: ProtocolFamily) -> (Feature, MockDevice) {
    let (channel, device) = mock::pair_on(BusFamily::Rs232);
    let bus = Bus::from_channel(Box::new(channel), Duration::from_millis(200)).unwrap();
    let ctx = FeatureContext::new(Arc::new(bus), spectro_protocol::instantiate(protocol), &PROFILE);
    (Feature::build(FeatureFamily::Spectrometer, ctx).unwrap(), device)
}

#[test]
fn compact_integration_time_readback() {
    let (feature, device) = spectrometer(ProtocolFamily::CompactSerial);
    device.expect_and_respond(&[0x01, 0x00, 0x01], &[0x01, 0x02, 0x00, 0x64, 0x67]);
    let spec = feature.as_spectrometer().unwrap();
    assert_eq!(spec.integration_time_micros().unwrap(), 100);
}

#[test]
fn compact_corrupted_reply_surfaces_protocol_error() {
    let (feature, device) = spectrometer(ProtocolFamily::CompactSerial);
    device.expect_and_respond(&[0x01, 0x00, 0x01], &[0x01, 0x02, 0x00, 0x64, 0x66]);
    let err = feature
        .as_spectrometer()
        .unwrap()
        .integration_time_micros()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn binary_integration_time_readback() {
    let obp = spectro_protocol::instantiate(ProtocolFamily::OceanBinary);
    let query = obp
        .encode(&Request::new(0x0011_0000).expect(Reply::fixed(4)))
        .unwrap();
    let reply = obp
        .encode(
            &Request::new(0x0011_0000)
                .param(Param::U32(100))
                .expect(Reply::Frame),
        )
        .unwrap();

    let (feature, device) = spectrometer(ProtocolFamily::OceanBinary);
    device.expect_and_respond(&query, &reply);
    assert_eq!(
        feature.as_spectrometer().unwrap().integration_time_micros().unwrap(),
        100
    );
}

#[test]
fn compact_spectrum_is_decoded_big_endian() {
    let (feature, device) = spectrometer(ProtocolFamily::CompactSerial);
    // [0x04, 6, 00 01 01 00 ff ff, xor]
    let mut reply = vec![0x04, 0x06, 0x00, 0x01, 0x01, 0x00, 0xFF, 0xFF];
    let xor = reply.iter().fold(0u8, |acc, b| acc ^ b);
    reply.push(xor);
    device.expect_and_respond(&[0x04, 0x00, 0x04], &reply);
    assert_eq!(
        feature
            .as_spectrometer()
            .unwrap()
            .request_formatted_spectrum()
            .unwrap(),
        vec![1.0, 256.0, 65_535.0]
    );
}

#[test]
fn unscripted_write_is_a_bus_failure() {
    let (feature, _device) = spectrometer(ProtocolFamily::CompactSerial);
    let err = feature
        .as_spectrometer()
        .unwrap()
        .integration_time_micros()
        .unwrap_err();
    // Nothing scripted: the strict mock rejects the write.
    assert_eq!(err.kind(), ErrorKind::Bus);
}
