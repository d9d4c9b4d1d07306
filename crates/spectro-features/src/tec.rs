//! Thermo-electric cooler.

use crate::commands::TecCommands;
use crate::context::FeatureContext;
use spectro_core::error::{SpectroError, SpectroResult};
use spectro_core::family::{FeatureFamily, ProtocolFamily};
use tracing::instrument;

const FEATURE: FeatureFamily = FeatureFamily::ThermoElectric;

/// TEC feature bound to one protocol.
#[derive(Debug)]
pub struct ThermoElectric {
    ctx: FeatureContext,
    commands: &'static dyn TecCommands,
}

impl ThermoElectric {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn TecCommands) -> Self {
        Self { ctx, commands }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    /// Switch the cooler on or off.
    pub fn set_enabled(&self, enabled: bool) -> SpectroResult<()> {
        self.ctx.execute(&self.commands.set_enabled(enabled))?;
        Ok(())
    }

    /// Set the target detector temperature.
    ///
    /// # Errors
    ///
    /// [`SpectroError::InvalidParameter`] when `celsius` is not finite or lies
    /// outside the model's setpoint range.
    #[instrument(skip(self), fields(protocol = %self.protocol()))]
    pub fn set_setpoint_celsius(&self, celsius: f64) -> SpectroResult<()> {
        let profile = self.ctx.profile();
        let limits = profile.tec.ok_or_else(|| {
            SpectroError::Configuration(format!("{} has a TEC binding but no TEC limits", profile.name))
        })?;
        if !celsius.is_finite()
            || celsius < limits.min_setpoint_celsius
            || celsius > limits.max_setpoint_celsius
        {
            return Err(SpectroError::invalid(
                FEATURE,
                format!(
                    "setpoint {} °C outside {}..={} °C",
                    celsius, limits.min_setpoint_celsius, limits.max_setpoint_celsius
                ),
            ));
        }
        self.ctx.execute(&self.commands.set_setpoint(celsius))?;
        Ok(())
    }

    /// Detector temperature in °C.
    pub fn temperature_celsius(&self) -> SpectroResult<f64> {
        let response = self.ctx.execute(&self.commands.query_temperature())?;
        Ok(self.commands.parse_temperature(&response)?)
    }
}
