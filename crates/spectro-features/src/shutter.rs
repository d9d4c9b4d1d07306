//! Shutter.

use crate::commands::ShutterCommands;
use crate::context::FeatureContext;
use spectro_core::error::SpectroResult;
use spectro_core::family::ProtocolFamily;
use tracing::debug;

/// Shutter feature bound to one protocol.
#[derive(Debug)]
pub struct Shutter {
    ctx: FeatureContext,
    commands: &'static dyn ShutterCommands,
}

impl Shutter {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn ShutterCommands) -> Self {
        Self { ctx, commands }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    /// Open or close the shutter.
    pub fn set_open(&self, open: bool) -> SpectroResult<()> {
        self.ctx.execute(&self.commands.set_open(open))?;
        debug!(open, "Shutter moved");
        Ok(())
    }
}
