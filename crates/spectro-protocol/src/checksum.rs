//! Checksum algorithms used by the framed protocol families.

use crc::{Crc, CRC_16_IBM_SDLC};
use serde::{Deserialize, Serialize};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Checksum carried in a binary-framed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumKind {
    /// Checksum field present but unused (all zero).
    None,
    /// CRC-16/IBM-SDLC (a.k.a. CRC-16/X-25), little-endian.
    #[default]
    Crc16,
}

impl ChecksumKind {
    /// Value of the header's checksum-type byte.
    pub fn wire_code(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Crc16 => 0x02,
        }
    }

    /// Inverse of [`wire_code`](Self::wire_code).
    pub fn from_wire(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::None),
            0x02 => Some(Self::Crc16),
            _ => None,
        }
    }

    /// Checksum of `data`; zero for [`ChecksumKind::None`].
    pub fn compute(self, data: &[u8]) -> u16 {
        match self {
            Self::None => 0,
            Self::Crc16 => crc16(data),
        }
    }
}

/// CRC-16/IBM-SDLC of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// XOR of every byte in `data`.
pub fn xor8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}
