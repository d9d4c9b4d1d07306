//! Static capability tables.
//!
//! Each device model declares, once, which protocol family answers each
//! feature over each bus it supports. The table is data, not code: a model
//! lists its [`FeatureBinding`]s and [`CapabilityTable`] indexes them for
//! lookup by `(feature, bus)`.
//!
//! The same feature can be bound to more than one protocol on the same bus
//! (dual-firmware units). The declaration order is kept: the first binding is
//! the preferred one and is what [`CapabilityTable::supported_protocol`]
//! returns.

use crate::error::{SpectroError, SpectroResult};
use crate::family::{BusFamily, FeatureFamily, ProtocolFamily};
use std::collections::HashMap;

/// One row of a model's capability declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureBinding {
    /// Feature category
    pub feature: FeatureFamily,
    /// Bus it is reachable over
    pub bus: BusFamily,
    /// Protocol that answers it there
    pub protocol: ProtocolFamily,
}

/// Shorthand constructor usable in `const` model declarations.
pub const fn bind(
    feature: FeatureFamily,
    bus: BusFamily,
    protocol: ProtocolFamily,
) -> FeatureBinding {
    FeatureBinding {
        feature,
        bus,
        protocol,
    }
}

/// Indexed capability declaration of one model.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    model: String,
    bindings: Vec<FeatureBinding>,
    index: HashMap<(FeatureFamily, BusFamily), Vec<ProtocolFamily>>,
}

impl CapabilityTable {
    /// Index `bindings` for `model`. Duplicate rows are collapsed.
    pub fn new(model: impl Into<String>, bindings: &[FeatureBinding]) -> Self {
        let mut ordered = Vec::with_capacity(bindings.len());
        let mut index: HashMap<(FeatureFamily, BusFamily), Vec<ProtocolFamily>> = HashMap::new();
        for binding in bindings {
            let protocols = index.entry((binding.feature, binding.bus)).or_default();
            if !protocols.contains(&binding.protocol) {
                protocols.push(binding.protocol);
                ordered.push(*binding);
            }
        }
        Self {
            model: model.into(),
            bindings: ordered,
            index,
        }
    }

    /// Model name the table belongs to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Every binding, in declaration order.
    pub fn bindings(&self) -> &[FeatureBinding] {
        &self.bindings
    }

    /// Preferred protocol answering `feature` over `bus`.
    ///
    /// Fails with [`SpectroError::FeatureNotSupported`] if the model never
    /// implements `feature` or does not bind it on `bus`, and with
    /// [`SpectroError::BusNotSupported`] if the feature exists but the model
    /// exposes nothing at all over `bus`.
    pub fn supported_protocol(
        &self,
        feature: FeatureFamily,
        bus: BusFamily,
    ) -> SpectroResult<ProtocolFamily> {
        let not_supported = || SpectroError::FeatureNotSupported {
            model: self.model.clone(),
            feature,
            bus,
        };
        if !self.implements(feature) {
            return Err(not_supported());
        }
        if !self.supports_bus(bus) {
            return Err(SpectroError::BusNotSupported {
                model: self.model.clone(),
                bus,
            });
        }
        self.protocols_for(feature, bus)
            .first()
            .copied()
            .ok_or_else(not_supported)
    }

    /// Whether `feature` is bound over any bus.
    pub fn implements(&self, feature: FeatureFamily) -> bool {
        self.bindings.iter().any(|b| b.feature == feature)
    }

    /// Every protocol bound to `feature` over `bus`, preferred first.
    pub fn protocols_for(&self, feature: FeatureFamily, bus: BusFamily) -> &[ProtocolFamily] {
        self.index
            .get(&(feature, bus))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any feature is bound over `bus`.
    pub fn supports_bus(&self, bus: BusFamily) -> bool {
        self.bindings.iter().any(|b| b.bus == bus)
    }

    /// Buses the model exposes features over, in declaration order.
    pub fn buses(&self) -> Vec<BusFamily> {
        let mut buses = Vec::new();
        for binding in &self.bindings {
            if !buses.contains(&binding.bus) {
                buses.push(binding.bus);
            }
        }
        buses
    }

    /// Features bound over `bus`, in declaration order.
    pub fn features_on(&self, bus: BusFamily) -> Vec<FeatureFamily> {
        let mut features = Vec::new();
        for binding in self.bindings_on(bus) {
            if !features.contains(&binding.feature) {
                features.push(binding.feature);
            }
        }
        features
    }

    /// Bindings over `bus`, in declaration order.
    pub fn bindings_on(&self, bus: BusFamily) -> impl Iterator<Item = &FeatureBinding> + '_ {
        self.bindings.iter().filter(move |b| b.bus == bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BusFamily::*;
    use FeatureFamily::*;
    use ProtocolFamily::*;

    fn dual() -> CapabilityTable {
        CapabilityTable::new(
            "Dual",
            &[
                bind(Spectrometer, Usb, OceanBinary),
                bind(Spectrometer, Usb, OoiLegacy),
                bind(Spectrometer, Usb, OceanBinary),
                bind(SerialNumber, Usb, OoiLegacy),
                bind(Spectrometer, Ethernet, OceanBinary),
            ],
        )
    }

    #[test]
    fn preferred_protocol_is_first_declared() {
        let table = dual();
        assert_eq!(
            table.supported_protocol(Spectrometer, Usb).unwrap(),
            OceanBinary
        );
        assert_eq!(table.protocols_for(Spectrometer, Usb), &[OceanBinary, OoiLegacy]);
        assert_eq!(table.bindings().len(), 4);
    }

    #[test]
    fn absent_feature_wins_over_absent_bus() {
        let table = dual();
        for bus in BusFamily::ALL {
            let err = table.supported_protocol(ThermoElectric, bus).unwrap_err();
            assert!(
                matches!(err, SpectroError::FeatureNotSupported { feature: ThermoElectric, .. }),
                "TEC over {}: {:?}",
                bus,
                err
            );
        }

        let err = table.supported_protocol(Spectrometer, Rs232).unwrap_err();
        assert!(matches!(err, SpectroError::BusNotSupported { bus: Rs232, .. }));

        let err = table.supported_protocol(SerialNumber, Ethernet).unwrap_err();
        assert!(matches!(
            err,
            SpectroError::FeatureNotSupported {
                feature: SerialNumber,
                bus: Ethernet,
                ..
            }
        ));
    }

    #[test]
    fn listing_keeps_declaration_order() {
        let table = dual();
        assert_eq!(table.buses(), vec![Usb, Ethernet]);
        assert_eq!(table.features_on(Usb), vec![Spectrometer, SerialNumber]);
        assert!(table.features_on(Rs232).is_empty());
    }
}
