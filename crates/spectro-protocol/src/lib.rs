//! `spectro-protocol`
//!
//! The three [`WireProtocol`] families:
//!
//! - [`OoiLegacy`]: single-byte opcodes, little-endian parameters, unframed
//!   fixed-size replies
//! - [`OceanBinary`]: 44-byte header, length-prefixed, CRC-16, status word
//! - [`CompactSerial`]: `[opcode, len, payload, xor]` frames with NAK status
//!
//! Protocol instances are immutable and shared as `Arc<dyn WireProtocol>`
//! between the features of a device.

pub mod checksum;
pub mod compact;
pub mod obp;
pub mod ooi;

pub use checksum::ChecksumKind;
pub use compact::CompactSerial;
pub use obp::OceanBinary;
pub use ooi::OoiLegacy;

use spectro_core::family::ProtocolFamily;
use spectro_core::protocol::WireProtocol;
use std::sync::Arc;

/// Default-configured instance of `family`.
pub fn instantiate(family: ProtocolFamily) -> Arc<dyn WireProtocol> {
    match family {
        ProtocolFamily::OoiLegacy => Arc::new(OoiLegacy::new()),
        ProtocolFamily::OceanBinary => Arc::new(OceanBinary::new(ChecksumKind::Crc16)),
        ProtocolFamily::CompactSerial => Arc::new(CompactSerial::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiate_matches_family() {
        for family in ProtocolFamily::ALL {
            assert_eq!(instantiate(family).family(), family);
        }
    }
}
