//! Ocean binary protocol: fixed 44-byte header, optional payload, 16-byte
//! checksum field and 4-byte footer.
//!
//! ```text
//!  0  C1 C0                start bytes
//!  2  u16  version         0x1100
//!  4  u16  flags           response | ack | ack requested | nack | exception
//!  6  u16  error number
//!  8  u32  message type    (opcode)
//! 12  u32  regarding
//! 16  [6]  reserved
//! 22  u8   checksum type   0 none, 2 CRC-16
//! 23  u8   immediate length (0..=16)
//! 24  [16] immediate data
//! 40  u32  bytes remaining = payload + 16 + 4
//! 44  [n]  payload
//!     [16] checksum (CRC-16 LE, then zero padding)
//!     C5 C4 C3 C2          footer
//! ```
//!
//! All integers are little-endian. Parameters up to 16 bytes travel as
//! immediate data, longer ones as payload.

use crate::checksum::ChecksumKind;
use bytes::{BufMut, BytesMut};
use spectro_core::bus::Transaction;
use spectro_core::error::{EncodingError, ProtocolError, SpectroResult};
use spectro_core::family::ProtocolFamily;
use spectro_core::limits::MAX_REPLY_BYTES;
use spectro_core::protocol::{Param, Reply, Request, Response, WireProtocol};
use std::time::Duration;

const FAMILY: ProtocolFamily = ProtocolFamily::OceanBinary;

/// Header size; the length field sits in its last four bytes.
pub const HEADER_LEN: usize = 44;
/// Checksum field size.
pub const CHECKSUM_LEN: usize = 16;
/// Footer size.
pub const FOOTER_LEN: usize = 4;
/// Largest immediate data block.
pub const IMMEDIATE_MAX: usize = 16;
/// Protocol version written and accepted.
pub const VERSION: u16 = 0x1100;

const START: [u8; 2] = [0xC1, 0xC0];
const FOOTER: [u8; 4] = [0xC5, 0xC4, 0xC3, 0xC2];
const TRAILER_LEN: usize = CHECKSUM_LEN + FOOTER_LEN;

/// Header flag bits.
pub mod flags {
    /// Message is a response
    pub const RESPONSE: u16 = 1 << 0;
    /// Message is an acknowledgement
    pub const ACK: u16 = 1 << 1;
    /// Sender requests an acknowledgement
    pub const ACK_REQUESTED: u16 = 1 << 2;
    /// Request was refused
    pub const NACK: u16 = 1 << 3;
    /// Firmware raised an exception
    pub const EXCEPTION: u16 = 1 << 4;
}

/// Ocean binary protocol instance, configured with the checksum kind both
/// sides agree on.
#[derive(Debug, Clone, Copy, Default)]
pub struct OceanBinary {
    checksum: ChecksumKind,
}

impl OceanBinary {
    /// Instance using `checksum` for outgoing frames and requiring it on replies.
    pub fn new(checksum: ChecksumKind) -> Self {
        Self { checksum }
    }

    /// Configured checksum kind.
    pub fn checksum(&self) -> ChecksumKind {
        self.checksum
    }

    fn malformed(reason: impl Into<String>) -> ProtocolError {
        ProtocolError::malformed(FAMILY, reason)
    }

    /// Validate the header fields needed before reading the remainder and
    /// return the announced remainder size.
    fn remaining_len(header: &[u8]) -> Result<usize, ProtocolError> {
        if header.len() < HEADER_LEN {
            return Err(Self::malformed(format!(
                "header is {} bytes, expected {}",
                header.len(),
                HEADER_LEN
            )));
        }
        if header[..2] != START {
            return Err(Self::malformed(format!(
                "bad start bytes {:02x} {:02x}",
                header[0], header[1]
            )));
        }
        let remaining = u32::from_le_bytes([header[40], header[41], header[42], header[43]]) as usize;
        if !(TRAILER_LEN..=MAX_REPLY_BYTES).contains(&remaining) {
            return Err(Self::malformed(format!(
                "bytes-remaining field {} outside {}..={}",
                remaining, TRAILER_LEN, MAX_REPLY_BYTES
            )));
        }
        Ok(remaining)
    }
}

fn serialize_params(params: &[Param]) -> BytesMut {
    let mut data = BytesMut::new();
    for param in params {
        match param {
            Param::U8(v) => data.put_u8(*v),
            Param::U16(v) => data.put_u16_le(*v),
            Param::U32(v) => data.put_u32_le(*v),
            Param::F32(v) => data.put_f32_le(*v),
            Param::Bytes(b) => data.put_slice(b),
        }
    }
    data
}

impl WireProtocol for OceanBinary {
    fn family(&self) -> ProtocolFamily {
        FAMILY
    }

    fn encode(&self, request: &Request) -> Result<Vec<u8>, EncodingError> {
        let data = serialize_params(&request.params);
        let max_payload = MAX_REPLY_BYTES - TRAILER_LEN;
        if data.len() > max_payload {
            return Err(EncodingError::PayloadTooLarge {
                protocol: FAMILY,
                len: data.len(),
                max: max_payload,
            });
        }
        let empty: &[u8] = &[];
        let (immediate, payload) = if data.len() <= IMMEDIATE_MAX {
            (&data[..], empty)
        } else {
            (empty, &data[..])
        };
        let flag_bits = if request.reply == Reply::Ack {
            flags::ACK_REQUESTED
        } else {
            0
        };

        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
        buf.put_slice(&START);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(flag_bits);
        buf.put_u16_le(0);
        buf.put_u32_le(request.opcode.0);
        buf.put_u32_le(0);
        buf.put_bytes(0, 6);
        buf.put_u8(self.checksum.wire_code());
        // Bounded by IMMEDIATE_MAX above.
        buf.put_u8(immediate.len() as u8);
        buf.put_slice(immediate);
        buf.put_bytes(0, IMMEDIATE_MAX - immediate.len());
        buf.put_u32_le((payload.len() + TRAILER_LEN) as u32);
        buf.put_slice(payload);

        let crc = self.checksum.compute(&buf);
        buf.put_u16_le(crc);
        buf.put_bytes(0, CHECKSUM_LEN - 2);
        buf.put_slice(&FOOTER);
        Ok(buf.to_vec())
    }

    fn decode(&self, request: &Request, frame: &[u8]) -> Result<Response, ProtocolError> {
        let remaining = Self::remaining_len(frame)?;
        if frame.len() != HEADER_LEN + remaining {
            return Err(Self::malformed(format!(
                "frame is {} bytes but header announces {}",
                frame.len(),
                HEADER_LEN + remaining
            )));
        }
        let version = u16::from_le_bytes([frame[2], frame[3]]);
        if version != VERSION {
            return Err(Self::malformed(format!("unsupported version {:#06x}", version)));
        }
        if frame[16..22].iter().any(|&b| b != 0) {
            return Err(Self::malformed("reserved header bytes are not zero"));
        }
        if frame[22] != self.checksum.wire_code() {
            return Err(Self::malformed(format!(
                "checksum type {:#04x}, expected {:#04x}",
                frame[22],
                self.checksum.wire_code()
            )));
        }
        let immediate_len = usize::from(frame[23]);
        if immediate_len > IMMEDIATE_MAX {
            return Err(Self::malformed(format!("immediate length {}", immediate_len)));
        }
        if frame[frame.len() - FOOTER_LEN..] != FOOTER {
            return Err(Self::malformed("bad footer"));
        }

        let payload_len = remaining - TRAILER_LEN;
        let checksum_at = HEADER_LEN + payload_len;
        let field = &frame[checksum_at..checksum_at + CHECKSUM_LEN];
        if field[2..].iter().any(|&b| b != 0) {
            return Err(Self::malformed("checksum padding is not zero"));
        }
        let carried = u16::from_le_bytes([field[0], field[1]]);
        let computed = self.checksum.compute(&frame[..checksum_at]);
        if carried != computed {
            if self.checksum == ChecksumKind::None {
                return Err(Self::malformed("checksum field set with checksum type none"));
            }
            return Err(ProtocolError::ChecksumMismatch {
                protocol: FAMILY,
                computed: u32::from(computed),
                carried: u32::from(carried),
            });
        }

        let flag_bits = u16::from_le_bytes([frame[4], frame[5]]);
        let error = u16::from_le_bytes([frame[6], frame[7]]);
        if flag_bits & flags::NACK != 0 || error != 0 {
            return Err(ProtocolError::Status {
                protocol: FAMILY,
                code: u32::from(error),
            });
        }

        let message_type = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
        if message_type != request.opcode.0 {
            return Err(Self::malformed(format!(
                "reply is for message {:#x}, expected {}",
                message_type, request.opcode
            )));
        }

        if immediate_len > 0 && payload_len > 0 {
            return Err(Self::malformed("both immediate data and payload present"));
        }
        let data = if immediate_len > 0 {
            &frame[24..24 + immediate_len]
        } else {
            &frame[HEADER_LEN..checksum_at]
        };
        if let Reply::Fixed { len, .. } = request.reply {
            if data.len() != len {
                return Err(Self::malformed(format!(
                    "reply carries {} data bytes, expected {}",
                    data.len(),
                    len
                )));
            }
        }

        Ok(Response::new(FAMILY, request.opcode, data.to_vec()))
    }

    fn read_reply(
        &self,
        tx: &mut Transaction<'_>,
        request: &Request,
        timeout: Duration,
    ) -> SpectroResult<Option<Vec<u8>>> {
        if request.reply == Reply::None {
            return Ok(None);
        }
        let mut frame = tx.read_exact(request.reply_endpoint, HEADER_LEN, timeout)?;
        let remaining = Self::remaining_len(&frame)?;
        let rest = tx.read_exact(request.reply_endpoint, remaining, timeout)?;
        frame.extend_from_slice(&rest);
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obp() -> OceanBinary {
        OceanBinary::new(ChecksumKind::Crc16)
    }

    /// Build a device reply carrying `data` for `opcode`.
    fn reply(opcode: u32, data: &[u8], flag_bits: u16, error: u16) -> Vec<u8> {
        let req = Request::new(opcode).param(Param::Bytes(data.to_vec())).expect(Reply::Frame);
        let mut frame = obp().encode(&req).unwrap();
        frame[4..6].copy_from_slice(&(flag_bits | flags::RESPONSE).to_le_bytes());
        frame[6..8].copy_from_slice(&error.to_le_bytes());
        let at = frame.len() - TRAILER_LEN;
        let crc = crate::checksum::crc16(&frame[..at]);
        frame[at..at + 2].copy_from_slice(&crc.to_le_bytes());
        frame
    }

    #[test]
    fn encode_layout() {
        let req = Request::new(0x0011_0010).param(Param::U32(10_000));
        let frame = obp().encode(&req).unwrap();
        assert_eq!(frame.len(), 64);
        assert_eq!(&frame[..4], &[0xC1, 0xC0, 0x00, 0x11]);
        assert_eq!(&frame[4..6], &flags::ACK_REQUESTED.to_le_bytes());
        assert_eq!(&frame[8..12], &0x0011_0010u32.to_le_bytes());
        assert_eq!(frame[22], 0x02);
        assert_eq!(frame[23], 4);
        assert_eq!(&frame[24..28], &10_000u32.to_le_bytes());
        assert_eq!(&frame[40..44], &20u32.to_le_bytes());
        assert_eq!(&frame[60..], &FOOTER);
    }

    #[test]
    fn long_params_travel_as_payload() {
        let req = Request::new(0x10).param(Param::Bytes(vec![7; 40])).expect(Reply::Frame);
        let frame = obp().encode(&req).unwrap();
        assert_eq!(frame[23], 0);
        assert_eq!(frame.len(), HEADER_LEN + 40 + TRAILER_LEN);
        let resp = obp().decode(&req, &frame).unwrap();
        assert_eq!(resp.payload(), &[7; 40][..]);
    }

    #[test]
    fn decodes_immediate_reply() {
        let req = Request::new(0x0010_0000).expect(Reply::fixed(4));
        let frame = reply(0x0010_0000, &[1, 2, 3, 4], 0, 0);
        let resp = obp().decode(&req, &frame).unwrap();
        assert_eq!(resp.u32_le_at(0).unwrap(), 0x0403_0201);
    }

    #[test]
    fn nack_and_error_number_become_status() {
        let req = Request::new(0x20).expect(Reply::Frame);
        let err = obp().decode(&req, &reply(0x20, &[], flags::NACK, 0x0005)).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Status {
                protocol: FAMILY,
                code: 5
            }
        );
        let err = obp().decode(&req, &reply(0x20, &[], 0, 0x0011)).unwrap_err();
        assert!(matches!(err, ProtocolError::Status { code: 0x11, .. }));
    }

    #[test]
    fn detects_crc_corruption() {
        let req = Request::new(0x20).expect(Reply::Frame);
        let mut frame = reply(0x20, &[9, 9], 0, 0);
        frame[25] ^= 0x01;
        assert!(matches!(
            obp().decode(&req, &frame).unwrap_err(),
            ProtocolError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn rejects_other_checksum_type_and_wrong_message() {
        let req = Request::new(0x20).expect(Reply::Frame);
        let frame = reply(0x20, &[], 0, 0);
        let plain = OceanBinary::new(ChecksumKind::None);
        assert!(matches!(
            plain.decode(&req, &frame).unwrap_err(),
            ProtocolError::Malformed { .. }
        ));

        let other = Request::new(0x21).expect(Reply::Frame);
        assert!(matches!(
            obp().decode(&other, &frame).unwrap_err(),
            ProtocolError::Malformed { .. }
        ));
    }

    #[test]
    fn truncated_and_oversized_length_fields() {
        let req = Request::new(0x20).expect(Reply::Frame);
        let frame = reply(0x20, &[1], 0, 0);
        assert!(obp().decode(&req, &frame[..50]).is_err());
        assert!(obp().decode(&req, &[]).is_err());

        let mut huge = frame.clone();
        huge[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            OceanBinary::remaining_len(&huge).unwrap_err(),
            ProtocolError::Malformed { .. }
        ));
    }
}
