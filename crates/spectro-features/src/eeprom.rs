//! Calibration EEPROM slots.
//!
//! Slot 0 holds the serial number and slots 1 to 4 hold the wavelength
//! calibration coefficients as ASCII decimals, lowest order first. Values are
//! returned as stored; no polynomial is evaluated here.

use crate::commands::{ascii, EepromCommands};
use crate::context::FeatureContext;
use spectro_core::error::{ProtocolError, SpectroError, SpectroResult};
use spectro_core::family::{FeatureFamily, ProtocolFamily};
use tracing::debug;

const FEATURE: FeatureFamily = FeatureFamily::Eeprom;

/// Slots holding the wavelength calibration.
pub const WAVELENGTH_SLOTS: std::ops::RangeInclusive<u8> = 1..=4;

/// EEPROM feature bound to one protocol.
#[derive(Debug)]
pub struct Eeprom {
    ctx: FeatureContext,
    commands: &'static dyn EepromCommands,
}

impl Eeprom {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn EepromCommands) -> Self {
        Self { ctx, commands }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    /// Raw contents of slot `index`.
    pub fn read_slot(&self, index: u8) -> SpectroResult<Vec<u8>> {
        let slots = self.ctx.profile().eeprom_slots;
        if index >= slots {
            return Err(SpectroError::invalid(
                FEATURE,
                format!("slot {} outside 0..{}", index, slots),
            ));
        }
        let response = self.ctx.execute(&self.commands.read_slot(index))?;
        let data = self.commands.slot_data(index, response)?;
        debug!(index, len = data.len(), "EEPROM slot read");
        Ok(data)
    }

    /// Slot `index` as NUL-terminated ASCII.
    pub fn read_slot_string(&self, index: u8) -> SpectroResult<String> {
        let data = self.read_slot(index)?;
        Ok(ascii(self.protocol(), &data)?)
    }

    /// The four stored wavelength coefficients.
    pub fn wavelength_coefficients(&self) -> SpectroResult<[f64; 4]> {
        let mut coefficients = [0.0; 4];
        for (slot, value) in WAVELENGTH_SLOTS.zip(coefficients.iter_mut()) {
            let text = self.read_slot_string(slot)?;
            *value = text.parse().map_err(|_| {
                ProtocolError::malformed(
                    self.protocol(),
                    format!("slot {} holds {:?}, not a number", slot, text),
                )
            })?;
        }
        Ok(coefficients)
    }
}
