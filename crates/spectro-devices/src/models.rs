//! Built-in model catalog.
//!
//! Every model is one static [`ModelDescriptor`]: its capability bindings,
//! the profile its features check arguments against, and how to find it on
//! USB. Dual-firmware units bind the same feature to two protocols on one
//! bus; the first binding is preferred.

use spectro_core::capabilities::{bind, CapabilityTable, FeatureBinding};
use spectro_core::family::{BusFamily, FeatureFamily, ProtocolFamily};
use spectro_features::commands::{compact::SERIAL_LEN as COMPACT_SERIAL_LEN, ooi::INFO_DATA_LEN};
use spectro_features::{
    IntegrationUnit, ModelProfile, PixelFormat, SpectrometerProfile, TecProfile, TriggerMode,
};

use BusFamily::{Ethernet, Rs232, Usb};
use FeatureFamily::{
    Eeprom, LightSource, SerialNumber, Shutter, Spectrometer, Strobe, ThermoElectric,
};
use ProtocolFamily::{CompactSerial, OceanBinary, OoiLegacy};

/// USB vendor id shared by every model in the catalog.
pub const VENDOR_ID: u16 = 0x2457;

/// Bulk endpoint layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointLayout {
    /// 0x02 out, 0x87 replies, 0x82 spectra
    Legacy,
    /// 0x01 out, 0x81 in
    Binary,
}

/// How a model appears on USB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIdentity {
    /// USB product id
    pub product_id: u16,
    /// Endpoint addresses
    pub endpoints: EndpointLayout,
}

/// Static description of one model.
#[derive(Debug)]
pub struct ModelDescriptor {
    /// Model name
    pub name: &'static str,
    /// Parameters the features check against
    pub profile: ModelProfile,
    /// `(feature, bus, protocol)` declarations, preferred first
    pub bindings: &'static [FeatureBinding],
    /// USB identity, for models with a USB port
    pub usb: Option<UsbIdentity>,
}

impl ModelDescriptor {
    /// Indexed capability table.
    pub fn capability_table(&self) -> CapabilityTable {
        CapabilityTable::new(self.name, self.bindings)
    }

    /// Buses the model exposes features over.
    pub fn buses(&self) -> Vec<BusFamily> {
        self.capability_table().buses()
    }
}

const ALL_TRIGGERS: &[TriggerMode] = &[
    TriggerMode::Normal,
    TriggerMode::Software,
    TriggerMode::ExternalLevel,
    TriggerMode::ExternalEdge,
];

/// USB2000: legacy firmware, millisecond integration, no cooler.
pub static USB2000: ModelDescriptor = ModelDescriptor {
    name: "USB2000",
    profile: ModelProfile {
        name: "USB2000",
        spectrometer: SpectrometerProfile {
            pixel_count: 2048,
            pixel_format: PixelFormat::U16Le,
            integration_unit: IntegrationUnit::Millis,
            integration_min_micros: 3_000,
            integration_max_micros: 65_535_000,
            max_intensity: 4095.0,
            trigger_modes: &[TriggerMode::Normal, TriggerMode::Software, TriggerMode::ExternalLevel],
            spectrum_on_data_endpoint: true,
        },
        tec: None,
        eeprom_slots: 19,
        serial_max_len: INFO_DATA_LEN,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Usb, OoiLegacy),
        bind(Strobe, Usb, OoiLegacy),
        bind(Eeprom, Usb, OoiLegacy),
        bind(SerialNumber, Usb, OoiLegacy),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x1002,
        endpoints: EndpointLayout::Legacy,
    }),
};

/// HR4000: legacy firmware with the inverted-bit-13 pixel format.
pub static HR4000: ModelDescriptor = ModelDescriptor {
    name: "HR4000",
    profile: ModelProfile {
        name: "HR4000",
        spectrometer: SpectrometerProfile {
            pixel_count: 3648,
            pixel_format: PixelFormat::U16LeMsbFlip,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 10,
            integration_max_micros: 65_000_000,
            max_intensity: 16383.0,
            trigger_modes: ALL_TRIGGERS,
            spectrum_on_data_endpoint: true,
        },
        tec: None,
        eeprom_slots: 19,
        serial_max_len: INFO_DATA_LEN,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Usb, OoiLegacy),
        bind(Strobe, Usb, OoiLegacy),
        bind(Eeprom, Usb, OoiLegacy),
        bind(SerialNumber, Usb, OoiLegacy),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x1012,
        endpoints: EndpointLayout::Legacy,
    }),
};

/// USB4000.
pub static USB4000: ModelDescriptor = ModelDescriptor {
    name: "USB4000",
    profile: ModelProfile {
        name: "USB4000",
        spectrometer: SpectrometerProfile {
            pixel_count: 3840,
            pixel_format: PixelFormat::U16Le,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 10,
            integration_max_micros: 65_000_000,
            max_intensity: 65535.0,
            trigger_modes: ALL_TRIGGERS,
            spectrum_on_data_endpoint: true,
        },
        tec: None,
        eeprom_slots: 19,
        serial_max_len: INFO_DATA_LEN,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Usb, OoiLegacy),
        bind(Strobe, Usb, OoiLegacy),
        bind(Eeprom, Usb, OoiLegacy),
        bind(SerialNumber, Usb, OoiLegacy),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x1022,
        endpoints: EndpointLayout::Legacy,
    }),
};

/// QE65000: legacy firmware with a cooled detector.
pub static QE65000: ModelDescriptor = ModelDescriptor {
    name: "QE65000",
    profile: ModelProfile {
        name: "QE65000",
        spectrometer: SpectrometerProfile {
            pixel_count: 1044,
            pixel_format: PixelFormat::U16Le,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 8_000,
            integration_max_micros: 15_000_000,
            max_intensity: 65535.0,
            trigger_modes: ALL_TRIGGERS,
            spectrum_on_data_endpoint: true,
        },
        tec: Some(TecProfile {
            min_setpoint_celsius: -30.0,
            max_setpoint_celsius: 25.0,
        }),
        eeprom_slots: 19,
        serial_max_len: INFO_DATA_LEN,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Usb, OoiLegacy),
        bind(ThermoElectric, Usb, OoiLegacy),
        bind(Strobe, Usb, OoiLegacy),
        bind(Eeprom, Usb, OoiLegacy),
        bind(SerialNumber, Usb, OoiLegacy),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x1018,
        endpoints: EndpointLayout::Legacy,
    }),
};

/// QE-Pro: binary protocol over USB and RS-232, cooled, with shutter.
pub static QE_PRO: ModelDescriptor = ModelDescriptor {
    name: "QE-Pro",
    profile: ModelProfile {
        name: "QE-Pro",
        spectrometer: SpectrometerProfile {
            pixel_count: 1044,
            pixel_format: PixelFormat::U32Le,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 8_000,
            integration_max_micros: 60_000_000,
            max_intensity: 200_000.0,
            trigger_modes: ALL_TRIGGERS,
            spectrum_on_data_endpoint: false,
        },
        tec: Some(TecProfile {
            min_setpoint_celsius: -30.0,
            max_setpoint_celsius: 20.0,
        }),
        eeprom_slots: 20,
        serial_max_len: 32,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Usb, OceanBinary),
        bind(ThermoElectric, Usb, OceanBinary),
        bind(Strobe, Usb, OceanBinary),
        bind(Shutter, Usb, OceanBinary),
        bind(Eeprom, Usb, OceanBinary),
        bind(SerialNumber, Usb, OceanBinary),
        bind(Spectrometer, Rs232, OceanBinary),
        bind(ThermoElectric, Rs232, OceanBinary),
        bind(Strobe, Rs232, OceanBinary),
        bind(Shutter, Rs232, OceanBinary),
        bind(Eeprom, Rs232, OceanBinary),
        bind(SerialNumber, Rs232, OceanBinary),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x4004,
        endpoints: EndpointLayout::Binary,
    }),
};

/// STS: binary protocol over USB and RS-232.
pub static STS: ModelDescriptor = ModelDescriptor {
    name: "STS",
    profile: ModelProfile {
        name: "STS",
        spectrometer: SpectrometerProfile {
            pixel_count: 1024,
            pixel_format: PixelFormat::U16Le,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 10,
            integration_max_micros: 85_000_000,
            max_intensity: 16383.0,
            trigger_modes: ALL_TRIGGERS,
            spectrum_on_data_endpoint: false,
        },
        tec: None,
        eeprom_slots: 20,
        serial_max_len: 16,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Usb, OceanBinary),
        bind(Strobe, Usb, OceanBinary),
        bind(Eeprom, Usb, OceanBinary),
        bind(SerialNumber, Usb, OceanBinary),
        bind(Spectrometer, Rs232, OceanBinary),
        bind(Strobe, Rs232, OceanBinary),
        bind(Eeprom, Rs232, OceanBinary),
        bind(SerialNumber, Rs232, OceanBinary),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x4000,
        endpoints: EndpointLayout::Binary,
    }),
};

/// Jaz: binary protocol over Ethernet; on USB the spectrometer answers both
/// the legacy and the binary command sets.
pub static JAZ: ModelDescriptor = ModelDescriptor {
    name: "Jaz",
    profile: ModelProfile {
        name: "Jaz",
        spectrometer: SpectrometerProfile {
            pixel_count: 2048,
            pixel_format: PixelFormat::U16Le,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 1_000,
            integration_max_micros: 65_000_000,
            max_intensity: 65535.0,
            trigger_modes: &[TriggerMode::Normal, TriggerMode::Software],
            spectrum_on_data_endpoint: false,
        },
        tec: None,
        eeprom_slots: 19,
        serial_max_len: INFO_DATA_LEN,
        light_sources: 2,
    },
    bindings: &[
        bind(Spectrometer, Ethernet, OceanBinary),
        bind(Strobe, Ethernet, OceanBinary),
        bind(Eeprom, Ethernet, OceanBinary),
        bind(SerialNumber, Ethernet, OceanBinary),
        bind(LightSource, Ethernet, OceanBinary),
        bind(Spectrometer, Usb, OoiLegacy),
        bind(Spectrometer, Usb, OceanBinary),
        bind(Eeprom, Usb, OoiLegacy),
        bind(SerialNumber, Usb, OoiLegacy),
        bind(LightSource, Usb, OceanBinary),
    ],
    usb: Some(UsbIdentity {
        product_id: 0x2000,
        endpoints: EndpointLayout::Binary,
    }),
};

/// SSM-100: compact serial protocol over RS-232 only.
pub static SSM_100: ModelDescriptor = ModelDescriptor {
    name: "SSM-100",
    profile: ModelProfile {
        name: "SSM-100",
        spectrometer: SpectrometerProfile {
            pixel_count: 100,
            pixel_format: PixelFormat::U16Be,
            integration_unit: IntegrationUnit::Micros,
            integration_min_micros: 10,
            integration_max_micros: 65_535,
            max_intensity: 65535.0,
            trigger_modes: &[TriggerMode::Normal, TriggerMode::Software],
            spectrum_on_data_endpoint: false,
        },
        tec: None,
        eeprom_slots: 8,
        serial_max_len: COMPACT_SERIAL_LEN,
        light_sources: 0,
    },
    bindings: &[
        bind(Spectrometer, Rs232, CompactSerial),
        bind(Shutter, Rs232, CompactSerial),
        bind(Eeprom, Rs232, CompactSerial),
        bind(SerialNumber, Rs232, CompactSerial),
    ],
    usb: None,
};

/// The whole catalog, in listing order.
pub static ALL: &[&ModelDescriptor] = &[
    &USB2000, &HR4000, &USB4000, &QE65000, &QE_PRO, &STS, &JAZ, &SSM_100,
];

/// Catalog entry named `name`, ignoring ASCII case.
pub fn find(name: &str) -> Option<&'static ModelDescriptor> {
    ALL.iter().copied().find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Catalog entry with USB product id `product_id`.
pub fn find_by_product_id(product_id: u16) -> Option<&'static ModelDescriptor> {
    ALL.iter()
        .copied()
        .find(|m| m.usb.is_some_and(|u| u.product_id == product_id))
}
