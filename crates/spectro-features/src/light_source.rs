//! Integrated light sources.

use crate::commands::LightSourceCommands;
use crate::context::FeatureContext;
use spectro_core::error::{SpectroError, SpectroResult};
use spectro_core::family::{FeatureFamily, ProtocolFamily};

const FEATURE: FeatureFamily = FeatureFamily::LightSource;

/// Light source feature bound to one protocol.
#[derive(Debug)]
pub struct LightSource {
    ctx: FeatureContext,
    commands: &'static dyn LightSourceCommands,
}

impl LightSource {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn LightSourceCommands) -> Self {
        Self { ctx, commands }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    fn check_index(&self, index: u8) -> SpectroResult<()> {
        let fitted = self.ctx.profile().light_sources;
        if index >= fitted {
            return Err(SpectroError::invalid(
                FEATURE,
                format!("light source {} outside 0..{}", index, fitted),
            ));
        }
        Ok(())
    }

    /// Number of light sources the device reports.
    pub fn count(&self) -> SpectroResult<u8> {
        let response = self.ctx.execute(&self.commands.query_count())?;
        Ok(self.commands.parse_count(&response)?)
    }

    /// Switch light source `index` on or off.
    pub fn set_enabled(&self, index: u8, enabled: bool) -> SpectroResult<()> {
        self.check_index(index)?;
        self.ctx.execute(&self.commands.set_enabled(index, enabled))?;
        Ok(())
    }

    /// Drive light source `index` at `fraction` of full intensity.
    pub fn set_intensity(&self, index: u8, fraction: f64) -> SpectroResult<()> {
        self.check_index(index)?;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(SpectroError::invalid(
                FEATURE,
                format!("intensity {} outside 0.0..=1.0", fraction),
            ));
        }
        self.ctx
            .execute(&self.commands.set_intensity(index, fraction as f32))?;
        Ok(())
    }
}
