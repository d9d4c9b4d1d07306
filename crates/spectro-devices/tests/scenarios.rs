//! Devices assembled from the catalog and driven through mock buses.

use spectro_bus::mock::{self, MockDevice};
use spectro_core::bus::Bus;
use spectro_core::error::{ErrorKind, SpectroError};
use spectro_core::family::{BusFamily, FeatureFamily, ProtocolFamily};
use spectro_devices::config::{load_config, ConfigLoadError, TransportConfig};
use spectro_devices::models::{self, ModelDescriptor};
use spectro_devices::{Device, DeviceRegistry};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Opened = (Result<Device, SpectroError>, MockDevice);

fn open(model: &'static ModelDescriptor, bus: BusFamily) -> Opened {
    let (channel, instrument) = mock::pair_on(bus);
    let bus = Bus::from_channel(Box::new(channel), Duration::from_millis(500)).unwrap();
    (Device::new(model, Arc::new(bus)), instrument)
}

#[test]
fn every_model_installs_exactly_its_bindings() {
    for &model in models::ALL {
        let table = model.capability_table();
        for bus in BusFamily::ALL {
            let (device, _instrument) = open(model, bus);
            if !table.supports_bus(bus) {
                let err = device.unwrap_err();
                assert!(
                    matches!(err, SpectroError::BusNotSupported { .. }),
                    "{} over {}: {}",
                    model.name,
                    bus,
                    err
                );
                continue;
            }
            let device = device.unwrap();
            assert_eq!(device.all_features().len(), table.bindings_on(bus).count());
            for feature in FeatureFamily::ALL {
                let installed: Vec<ProtocolFamily> =
                    device.features(feature).iter().map(|f| f.protocol()).collect();
                assert_eq!(
                    installed.as_slice(),
                    table.protocols_for(feature, bus),
                    "{} {} over {}",
                    model.name,
                    feature,
                    bus
                );
            }
        }
    }
}

#[test]
fn resolution_matches_installed_features_across_the_catalog() {
    for &model in models::ALL {
        let table = model.capability_table();
        for bus in BusFamily::ALL {
            let (device, _instrument) = open(model, bus);
            let device = device.ok();
            for feature in FeatureFamily::ALL {
                let context = format!("{} {} over {}", model.name, feature, bus);
                match table.supported_protocol(feature, bus) {
                    Ok(protocol) => {
                        let device = device.as_ref().expect(&context);
                        let installed: Vec<ProtocolFamily> =
                            device.features(feature).iter().map(|f| f.protocol()).collect();
                        assert_eq!(installed.first(), Some(&protocol), "{}", context);
                        assert_eq!(
                            device.supported_protocol(feature, bus).unwrap(),
                            protocol,
                            "{}",
                            context
                        );
                    }
                    Err(SpectroError::FeatureNotSupported {
                        feature: f,
                        bus: b,
                        ..
                    }) => {
                        assert_eq!((f, b), (feature, bus), "{}", context);
                        assert!(table.protocols_for(feature, bus).is_empty(), "{}", context);
                        if let Some(device) = &device {
                            assert!(device.features(feature).is_empty(), "{}", context);
                        }
                    }
                    Err(SpectroError::BusNotSupported { bus: b, .. }) => {
                        assert_eq!(b, bus, "{}", context);
                        assert!(table.implements(feature), "{}", context);
                        assert!(!table.supports_bus(bus), "{}", context);
                        assert!(device.is_none(), "{}", context);
                    }
                    Err(other) => panic!("{}: unexpected {:?}", context, other),
                }
            }
        }
    }
}

#[test]
fn usb2000_has_no_tec() {
    let (device, instrument) = open(&models::USB2000, BusFamily::Usb);
    let device = device.unwrap();

    let err = device.thermo_electric().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(err.is_capability_probe());
    assert!(device.features(FeatureFamily::ThermoElectric).is_empty());

    // A feature the model never implements is absent on every bus.
    for bus in BusFamily::ALL {
        let err = device
            .supported_protocol(FeatureFamily::ThermoElectric, bus)
            .unwrap_err();
        assert!(
            matches!(
                err,
                SpectroError::FeatureNotSupported {
                    feature: FeatureFamily::ThermoElectric,
                    ..
                }
            ),
            "TEC over {}: {:?}",
            bus,
            err
        );
    }
    assert_eq!(
        device
            .supported_protocol(FeatureFamily::Spectrometer, BusFamily::Usb)
            .unwrap(),
        ProtocolFamily::OoiLegacy
    );

    // Capability lookups never touch the wire.
    assert!(instrument.written().is_empty());
}

#[test]
fn ssm100_integration_time_over_rs232() {
    let (device, instrument) = open(&models::SSM_100, BusFamily::Rs232);
    let device = device.unwrap();
    instrument.expect_and_respond(&[0x01, 0x00, 0x01], &[0x01, 0x02, 0x00, 0x64, 0x67]);

    let spectrometer = device.spectrometer().unwrap();
    assert_eq!(spectrometer.protocol(), ProtocolFamily::CompactSerial);
    assert_eq!(spectrometer.integration_time_micros().unwrap(), 100);
    assert!(instrument.script_done());
}

#[test]
fn closed_device_reports_not_open() {
    let (device, _instrument) = open(&models::SSM_100, BusFamily::Rs232);
    let device = device.unwrap();
    device.close().unwrap();
    let err = device
        .spectrometer()
        .unwrap()
        .integration_time_micros()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bus);
}

#[test]
fn threads_share_one_device() {
    const THREADS: usize = 8;
    let (device, instrument) = open(&models::SSM_100, BusFamily::Rs232);
    let device = Arc::new(device.unwrap());
    for _ in 0..THREADS {
        instrument.expect_and_respond(&[0x01, 0x00, 0x01], &[0x01, 0x02, 0x00, 0x64, 0x67]);
    }

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let device = Arc::clone(&device);
            thread::spawn(move || device.spectrometer().unwrap().integration_time_micros())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 100);
    }
    assert!(instrument.script_done());
}

#[test]
fn config_file_feeds_the_registry() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[timeouts]
read_timeout_ms = 250

[[devices]]
id = "bench"
model = "ssm-100"
transport = {{ type = "serial", port = "/dev/ttyUSB0", baud_rate = 115200 }}

[[devices]]
id = "cooled"
model = "QE-Pro"
timeout_ms = 5000
transport = {{ type = "usb" }}
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.timeouts.read_timeout_ms, 250);
    assert_eq!(config.devices.len(), 2);
    let bench = config.device("bench").unwrap();
    assert_eq!(
        bench.transport,
        TransportConfig::Serial {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200
        }
    );
    assert_eq!(config.device("cooled").unwrap().timeout_ms, Some(5000));

    // Stand-in for the real port: same model, mock bus.
    let model = DeviceRegistry::model(&bench.model).unwrap();
    let (channel, _instrument) = mock::pair_on(bench.transport.bus());
    let bus = Bus::from_channel(Box::new(channel), Duration::from_millis(250)).unwrap();
    let mut registry = DeviceRegistry::new();
    registry
        .insert(bench.id.clone(), Device::new(model, Arc::new(bus)).unwrap())
        .unwrap();

    let listed = registry.list_devices();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].model, "SSM-100");
    assert_eq!(listed[0].bus, BusFamily::Rs232);
    assert!(listed[0].features.contains(&FeatureFamily::Shutter));
    assert!(registry.get("bench").is_some());
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigLoadError::NotFound(_)));
}
