//! A model bound to one opened bus, with every feature installed up front.

use crate::models::ModelDescriptor;
use spectro_core::bus::Bus;
use spectro_core::capabilities::CapabilityTable;
use spectro_core::error::{BusError, SpectroError, SpectroResult};
use spectro_core::family::{BusFamily, FeatureFamily, ProtocolFamily};
use spectro_core::protocol::WireProtocol;
use spectro_features::{
    Eeprom, Feature, FeatureContext, LightSource, SerialNumber, Shutter, Spectrometer, Strobe,
    ThermoElectric,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// One spectrometer reachable over one bus.
///
/// Construction resolves the model's capability table against the bus and
/// builds every bound feature eagerly, so a `Device` that exists can serve
/// every feature it reports. Features share the bus by reference; one
/// protocol instance is shared by all features speaking that family.
pub struct Device {
    model: &'static ModelDescriptor,
    bus: Arc<Bus>,
    capabilities: CapabilityTable,
    features: Vec<Feature>,
}

impl Device {
    /// Install `model`'s features over `bus`.
    ///
    /// # Errors
    ///
    /// - [`BusError::NotOpen`] if the channel is closed
    /// - [`SpectroError::BusNotSupported`] if the model exposes nothing over this bus
    /// - [`SpectroError::Configuration`] if a binding names a protocol with no
    ///   command set for the feature
    #[instrument(skip(model, bus), fields(model = model.name, bus = %bus.family()))]
    pub fn new(model: &'static ModelDescriptor, bus: Arc<Bus>) -> SpectroResult<Self> {
        let family = bus.family();
        if !bus.is_open() {
            return Err(BusError::NotOpen { bus: family }.into());
        }
        let capabilities = model.capability_table();
        if !capabilities.supports_bus(family) {
            return Err(SpectroError::BusNotSupported {
                model: model.name.to_string(),
                bus: family,
            });
        }

        let mut protocols: HashMap<ProtocolFamily, Arc<dyn WireProtocol>> = HashMap::new();
        let mut features = Vec::new();
        for binding in capabilities.bindings_on(family) {
            let protocol = protocols
                .entry(binding.protocol)
                .or_insert_with(|| spectro_protocol::instantiate(binding.protocol))
                .clone();
            let ctx = FeatureContext::new(bus.clone(), protocol, &model.profile);
            features.push(Feature::build(binding.feature, ctx)?);
        }

        info!(features = features.len(), "Device ready");
        Ok(Self {
            model,
            bus,
            capabilities,
            features,
        })
    }

    /// Model descriptor.
    pub fn model(&self) -> &'static ModelDescriptor {
        self.model
    }

    /// Model name.
    pub fn name(&self) -> &'static str {
        self.model.name
    }

    /// The shared bus.
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Medium of the bus.
    pub fn bus_family(&self) -> BusFamily {
        self.bus.family()
    }

    /// The model's full capability table, over every bus.
    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Preferred protocol for `feature` over `bus`, per the model's table.
    ///
    /// A feature the model never implements is `FeatureNotSupported` on
    /// every bus; `BusNotSupported` means the feature exists but the model
    /// exposes nothing over `bus`.
    pub fn supported_protocol(
        &self,
        feature: FeatureFamily,
        bus: BusFamily,
    ) -> SpectroResult<ProtocolFamily> {
        self.capabilities.supported_protocol(feature, bus)
    }

    /// Installed implementations of `family`, preferred first. Empty when the
    /// model has none over this bus.
    pub fn features(&self, family: FeatureFamily) -> Vec<&Feature> {
        self.features
            .iter()
            .filter(|f| f.family() == family)
            .collect()
    }

    /// Every installed feature, in installation order.
    pub fn all_features(&self) -> &[Feature] {
        &self.features
    }

    /// The `family` implementation speaking `protocol`.
    pub fn feature_for_protocol(
        &self,
        family: FeatureFamily,
        protocol: ProtocolFamily,
    ) -> SpectroResult<&Feature> {
        self.features
            .iter()
            .find(|f| f.family() == family && f.protocol() == protocol)
            .ok_or_else(|| self.not_supported(family))
    }

    fn not_supported(&self, feature: FeatureFamily) -> SpectroError {
        SpectroError::FeatureNotSupported {
            model: self.model.name.to_string(),
            feature,
            bus: self.bus.family(),
        }
    }

    fn first<'a, T>(
        &'a self,
        family: FeatureFamily,
        pick: fn(&'a Feature) -> Option<&'a T>,
    ) -> SpectroResult<&'a T> {
        self.features
            .iter()
            .find_map(pick)
            .ok_or_else(|| self.not_supported(family))
    }

    /// Preferred spectrometer.
    pub fn spectrometer(&self) -> SpectroResult<&Spectrometer> {
        self.first(FeatureFamily::Spectrometer, Feature::as_spectrometer)
    }

    /// Preferred TEC.
    pub fn thermo_electric(&self) -> SpectroResult<&ThermoElectric> {
        self.first(FeatureFamily::ThermoElectric, Feature::as_thermo_electric)
    }

    /// Preferred strobe.
    pub fn strobe(&self) -> SpectroResult<&Strobe> {
        self.first(FeatureFamily::Strobe, Feature::as_strobe)
    }

    /// Preferred shutter.
    pub fn shutter(&self) -> SpectroResult<&Shutter> {
        self.first(FeatureFamily::Shutter, Feature::as_shutter)
    }

    /// Preferred EEPROM.
    pub fn eeprom(&self) -> SpectroResult<&Eeprom> {
        self.first(FeatureFamily::Eeprom, Feature::as_eeprom)
    }

    /// Preferred serial number feature.
    pub fn serial_number(&self) -> SpectroResult<&SerialNumber> {
        self.first(FeatureFamily::SerialNumber, Feature::as_serial_number)
    }

    /// Preferred light sources.
    pub fn light_source(&self) -> SpectroResult<&LightSource> {
        self.first(FeatureFamily::LightSource, Feature::as_light_source)
    }

    /// Close the bus. Every later operation fails with `NotOpen`.
    pub fn close(&self) -> Result<(), BusError> {
        self.bus.close()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("model", &self.model.name)
            .field("bus", &self.bus)
            .field(
                "features",
                &self
                    .features
                    .iter()
                    .map(|f| (f.family(), f.protocol()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
