//! Strobe/lamp enable line.

use crate::commands::StrobeCommands;
use crate::context::FeatureContext;
use spectro_core::error::SpectroResult;
use spectro_core::family::ProtocolFamily;

/// Strobe feature bound to one protocol.
#[derive(Debug)]
pub struct Strobe {
    ctx: FeatureContext,
    commands: &'static dyn StrobeCommands,
}

impl Strobe {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn StrobeCommands) -> Self {
        Self { ctx, commands }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    /// Enable or disable the strobe output.
    pub fn set_strobe_enabled(&self, enabled: bool) -> SpectroResult<()> {
        self.ctx.execute(&self.commands.set_enabled(enabled))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands, testing};
    use spectro_core::family::BusFamily;

    #[test]
    fn legacy_strobe_is_u16_flag() {
        let (ctx, device) = testing::context(BusFamily::Usb, ProtocolFamily::OoiLegacy, &testing::LEGACY);
        let strobe = Strobe::new(ctx, commands::strobe(ProtocolFamily::OoiLegacy).unwrap());
        device.expect_write(&[0x03, 0x01, 0x00]);
        strobe.set_strobe_enabled(true).unwrap();
        assert!(device.script_done());
    }
}
