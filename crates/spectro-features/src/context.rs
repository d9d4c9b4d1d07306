//! The shared state every feature implementation is built from.

use crate::profile::ModelProfile;
use spectro_core::bus::Bus;
use spectro_core::error::SpectroResult;
use spectro_core::family::{BusFamily, ProtocolFamily};
use spectro_core::protocol::{Request, Response, WireProtocol};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One protocol instance bound to the device's bus and model profile.
///
/// Cloning is cheap: the bus and protocol are shared, never duplicated.
#[derive(Clone)]
pub struct FeatureContext {
    bus: Arc<Bus>,
    protocol: Arc<dyn WireProtocol>,
    profile: &'static ModelProfile,
}

impl FeatureContext {
    /// Bind `protocol` to `bus` for a model described by `profile`.
    pub fn new(bus: Arc<Bus>, protocol: Arc<dyn WireProtocol>, profile: &'static ModelProfile) -> Self {
        Self {
            bus,
            protocol,
            profile,
        }
    }

    /// Protocol family this context speaks.
    pub fn protocol_family(&self) -> ProtocolFamily {
        self.protocol.family()
    }

    /// Medium of the underlying bus.
    pub fn bus_family(&self) -> BusFamily {
        self.bus.family()
    }

    /// Model parameters.
    pub fn profile(&self) -> &'static ModelProfile {
        self.profile
    }

    /// Default timeout of the bus.
    pub fn default_timeout(&self) -> Duration {
        self.bus.default_timeout()
    }

    /// Execute with the bus default timeout.
    pub fn execute(&self, request: &Request) -> SpectroResult<Response> {
        self.protocol.execute(&self.bus, request, self.bus.default_timeout())
    }

    /// Execute with an explicit timeout.
    pub fn execute_within(&self, request: &Request, timeout: Duration) -> SpectroResult<Response> {
        self.protocol.execute(&self.bus, request, timeout)
    }
}

impl fmt::Debug for FeatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureContext")
            .field("model", &self.profile.name)
            .field("bus", &self.bus.family())
            .field("protocol", &self.protocol.family())
            .finish()
    }
}
