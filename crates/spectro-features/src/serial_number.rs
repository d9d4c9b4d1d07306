//! Factory serial number.

use crate::commands::SerialNumberCommands;
use crate::context::FeatureContext;
use spectro_core::error::SpectroResult;
use spectro_core::family::ProtocolFamily;

/// Serial number feature bound to one protocol.
#[derive(Debug)]
pub struct SerialNumber {
    ctx: FeatureContext,
    commands: &'static dyn SerialNumberCommands,
}

impl SerialNumber {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn SerialNumberCommands) -> Self {
        Self { ctx, commands }
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    /// The serial number, trimmed.
    pub fn serial_number(&self) -> SpectroResult<String> {
        let response = self.ctx.execute(&self.commands.query_serial())?;
        Ok(self.commands.parse_serial(response)?)
    }

    /// Longest serial number the firmware can report. Asked from the device
    /// when the protocol has a command for it, else taken from the model.
    pub fn max_length(&self) -> SpectroResult<usize> {
        match self.commands.query_max_length() {
            Some(request) => {
                let response = self.ctx.execute(&request)?;
                Ok(self.commands.parse_max_length(&response)?)
            }
            None => Ok(self.ctx.profile().serial_max_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands, testing};
    use spectro_core::family::BusFamily;
    use spectro_core::protocol::{Reply, Request};

    #[test]
    fn compact_serial_number() {
        let (ctx, device) =
            testing::context(BusFamily::Rs232, ProtocolFamily::CompactSerial, &testing::COMPACT);
        let sn = SerialNumber::new(ctx, commands::serial_number(ProtocolFamily::CompactSerial).unwrap());
        device.expect_and_respond(
            &testing::command(
                ProtocolFamily::CompactSerial,
                &Request::new(0x05).expect(Reply::Frame),
            ),
            &testing::reply(ProtocolFamily::CompactSerial, 0x05, b"SSM00042\0\0"),
        );
        assert_eq!(sn.serial_number().unwrap(), "SSM00042");
        assert_eq!(sn.max_length().unwrap(), testing::COMPACT.serial_max_len);
    }

    #[test]
    fn binary_max_length_is_queried() {
        let (ctx, device) =
            testing::context(BusFamily::Usb, ProtocolFamily::OceanBinary, &testing::BINARY);
        let sn = SerialNumber::new(ctx, commands::serial_number(ProtocolFamily::OceanBinary).unwrap());
        device.expect_and_respond(
            &testing::command(
                ProtocolFamily::OceanBinary,
                &Request::new(0x0010_0008).expect(Reply::fixed(1)),
            ),
            &testing::reply(ProtocolFamily::OceanBinary, 0x0010_0008, &[32]),
        );
        assert_eq!(sn.max_length().unwrap(), 32);
    }
}
