//! Opened devices keyed by configuration id.

use crate::config::{DeviceEntry, SpectroConfig, TimeoutSettings, TransportConfig};
use crate::device::Device;
use crate::models::{self, ModelDescriptor};
use spectro_core::bus::{Bus, TransportChannel};
use spectro_core::error::{SpectroError, SpectroResult};
use spectro_core::family::{BusFamily, FeatureFamily};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Summary of one registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Configuration id
    pub id: String,
    /// Model name
    pub model: &'static str,
    /// Bus the device is reached over
    pub bus: BusFamily,
    /// Installed feature families, in installation order, without repeats
    pub features: Vec<FeatureFamily>,
}

fn channel_for(
    model: &'static ModelDescriptor,
    transport: &TransportConfig,
) -> SpectroResult<Box<dyn TransportChannel>> {
    match transport {
        #[cfg(feature = "serial")]
        TransportConfig::Serial { port, baud_rate } => Ok(Box::new(
            spectro_bus::SerialChannel::new(port.clone(), *baud_rate),
        )),
        #[cfg(not(feature = "serial"))]
        TransportConfig::Serial { .. } => Err(SpectroError::Configuration(
            "built without serial support".to_string(),
        )),
        TransportConfig::Tcp { host, port } => {
            Ok(Box::new(spectro_bus::TcpChannel::new(host.clone(), *port)))
        }
        #[cfg(feature = "usb")]
        TransportConfig::Usb { serial_number } => {
            let usb = model.usb.ok_or_else(|| {
                SpectroError::Configuration(format!("{} has no USB interface", model.name))
            })?;
            Ok(Box::new(spectro_bus::UsbChannel::new(
                models::VENDOR_ID,
                usb.product_id,
                serial_number.clone(),
                usb_endpoints(usb.endpoints),
            )))
        }
        #[cfg(not(feature = "usb"))]
        TransportConfig::Usb { .. } => Err(SpectroError::Configuration(format!(
            "{}: built without USB support",
            model.name
        ))),
    }
}

#[cfg(feature = "usb")]
fn usb_endpoints(layout: models::EndpointLayout) -> spectro_bus::UsbEndpoints {
    match layout {
        models::EndpointLayout::Legacy => spectro_bus::UsbEndpoints::LEGACY,
        models::EndpointLayout::Binary => spectro_bus::UsbEndpoints::BINARY,
    }
}

/// Open the device described by `entry`.
#[instrument(skip(entry, timeouts), fields(id = %entry.id, model = %entry.model))]
pub fn open_device(entry: &DeviceEntry, timeouts: &TimeoutSettings) -> SpectroResult<Device> {
    let model = DeviceRegistry::model(&entry.model)?;
    let channel = channel_for(model, &entry.transport)?;
    let bus = Bus::open(channel, &timeouts.channel_config(entry.timeout_ms))?;
    Device::new(model, Arc::new(bus))
}

/// Open every attached USB device the catalog knows, one per product id.
#[cfg(feature = "usb")]
pub fn discover_usb(timeouts: &TimeoutSettings) -> SpectroResult<Vec<Device>> {
    let mut devices = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for info in spectro_bus::usb::scan(models::VENDOR_ID)? {
        let Some(model) = models::find_by_product_id(info.product_id) else {
            tracing::debug!(product_id = info.product_id, "Skipping unknown USB product");
            continue;
        };
        if !seen.insert(info.product_id) {
            continue;
        }
        let opened = channel_for(model, &TransportConfig::Usb { serial_number: None })
            .and_then(|channel| Bus::open(channel, &timeouts.channel_config(None)))
            .and_then(|bus| Device::new(model, Arc::new(bus)));
        match opened {
            Ok(device) => devices.push(device),
            Err(e) => warn!(model = model.name, error = %e, "Failed to open USB device"),
        }
    }
    Ok(devices)
}

/// Devices opened from configuration, addressable by id.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Arc<Device>>,
}

impl DeviceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog model named `name`.
    pub fn model(name: &str) -> SpectroResult<&'static ModelDescriptor> {
        models::find(name).ok_or_else(|| SpectroError::UnknownModel(name.to_string()))
    }

    /// Catalog model with USB product id `product_id`.
    pub fn model_by_product_id(product_id: u16) -> SpectroResult<&'static ModelDescriptor> {
        models::find_by_product_id(product_id)
            .ok_or_else(|| SpectroError::UnknownModel(format!("USB product {:#06x}", product_id)))
    }

    /// Open every configured device. Entries that fail to open are logged and
    /// skipped, so one unplugged instrument does not block the rest.
    pub fn from_config(config: &SpectroConfig) -> Self {
        let mut registry = Self::new();
        for entry in &config.devices {
            if let Err(e) = registry.register(entry, &config.timeouts) {
                warn!(id = %entry.id, error = %e, "Failed to open configured device");
            }
        }
        info!(devices = registry.len(), "Device registry ready");
        registry
    }

    /// Open `entry` and register it under its id.
    ///
    /// # Errors
    ///
    /// [`SpectroError::Configuration`] if the id is already registered, plus
    /// whatever opening the device fails with.
    pub fn register(&mut self, entry: &DeviceEntry, timeouts: &TimeoutSettings) -> SpectroResult<()> {
        if self.contains(&entry.id) {
            return Err(SpectroError::Configuration(format!(
                "device id '{}' already registered",
                entry.id
            )));
        }
        let device = open_device(entry, timeouts)?;
        self.insert(entry.id.clone(), device)
    }

    /// Register an already constructed device.
    pub fn insert(&mut self, id: impl Into<String>, device: Device) -> SpectroResult<()> {
        let id = id.into();
        if self.contains(&id) {
            return Err(SpectroError::Configuration(format!(
                "device id '{}' already registered",
                id
            )));
        }
        self.devices.insert(id, Arc::new(device));
        Ok(())
    }

    /// Close and forget device `id`.
    pub fn unregister(&mut self, id: &str) -> bool {
        match self.devices.remove(id) {
            Some(device) => {
                if let Err(e) = device.close() {
                    warn!(id, error = %e, "Close failed while unregistering");
                }
                true
            }
            None => false,
        }
    }

    /// Device `id`.
    pub fn get(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Summaries of every device, ordered by id.
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .map(|(id, device)| {
                let mut features: Vec<FeatureFamily> = Vec::new();
                for feature in device.all_features() {
                    if !features.contains(&feature.family()) {
                        features.push(feature.family());
                    }
                }
                DeviceInfo {
                    id: id.clone(),
                    model: device.name(),
                    bus: device.bus_family(),
                    features,
                }
            })
            .collect()
    }

    /// Ids of devices with at least one `feature` implementation.
    pub fn devices_with_feature(&self, feature: FeatureFamily) -> Vec<String> {
        self.devices
            .iter()
            .filter(|(_, d)| !d.features(feature).is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectro_bus::mock;
    use std::time::Duration;

    fn mock_device(model_name: &str, bus: BusFamily) -> Device {
        let (channel, _device) = mock::pair_on(bus);
        let bus = Bus::from_channel(Box::new(channel), Duration::from_millis(100)).unwrap();
        Device::new(DeviceRegistry::model(model_name).unwrap(), Arc::new(bus)).unwrap()
    }

    #[test]
    fn unknown_model_is_a_configuration_error() {
        let err = DeviceRegistry::model("XR-9").unwrap_err();
        assert!(matches!(err, SpectroError::UnknownModel(_)));
        assert_eq!(
            DeviceRegistry::model_by_product_id(0x4004).unwrap().name,
            "QE-Pro"
        );
    }

    #[test]
    fn insert_list_and_filter() {
        let mut registry = DeviceRegistry::new();
        registry.insert("bench", mock_device("SSM-100", BusFamily::Rs232)).unwrap();
        registry.insert("cooled", mock_device("QE-Pro", BusFamily::Usb)).unwrap();
        assert!(registry.insert("bench", mock_device("STS", BusFamily::Usb)).is_err());

        let list = registry.list_devices();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "bench");
        assert_eq!(list[0].model, "SSM-100");
        assert_eq!(
            registry.devices_with_feature(FeatureFamily::ThermoElectric),
            vec!["cooled".to_string()]
        );

        assert!(registry.unregister("bench"));
        assert!(!registry.contains("bench"));
    }

    #[tracing_test::traced_test]
    #[test]
    fn unreachable_tcp_entry_is_skipped() {
        let config = crate::config::load_config_from_str(
            r#"
            [timeouts]
            read_timeout_ms = 50
            write_timeout_ms = 50

            [[devices]]
            id = "jaz"
            model = "Jaz"
            transport = { type = "tcp", host = "127.0.0.1", port = 9 }
            "#,
        )
        .unwrap();
        let registry = DeviceRegistry::from_config(&config);
        assert!(registry.is_empty());
        assert!(logs_contain("Failed to open configured device"));
    }
}
