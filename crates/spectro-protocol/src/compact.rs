//! Compact serial protocol: `[opcode, len, payload.., xor]`.
//!
//! The trailing byte is the XOR of every byte before it. Integers are 16-bit
//! big-endian. A reply whose opcode has bit 7 set is a NAK and carries the
//! device status code in its first payload byte.

use crate::checksum::xor8;
use bytes::{BufMut, BytesMut};
use spectro_core::bus::Transaction;
use spectro_core::error::{EncodingError, ProtocolError, SpectroResult};
use spectro_core::family::ProtocolFamily;
use spectro_core::protocol::{Param, Reply, Request, Response, WireProtocol};
use std::time::Duration;

const FAMILY: ProtocolFamily = ProtocolFamily::CompactSerial;

/// Opcode bit marking a negative acknowledgement.
pub const NAK_BIT: u8 = 0x80;
/// Largest payload the length byte can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;
const HEADER_LEN: usize = 2;

/// Compact serial protocol instance. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactSerial;

impl CompactSerial {
    /// New instance.
    pub fn new() -> Self {
        Self
    }
}

fn out_of_range(index: usize, value: u64, max: u64) -> EncodingError {
    EncodingError::ParameterOutOfRange {
        protocol: FAMILY,
        index,
        value,
        max,
    }
}

impl WireProtocol for CompactSerial {
    fn family(&self) -> ProtocolFamily {
        FAMILY
    }

    fn encode(&self, request: &Request) -> Result<Vec<u8>, EncodingError> {
        let opcode = request.opcode.0;
        if opcode >= u32::from(NAK_BIT) {
            return Err(EncodingError::OpcodeOutOfRange {
                protocol: FAMILY,
                opcode,
                max: u32::from(NAK_BIT - 1),
            });
        }

        let mut payload = BytesMut::new();
        for (index, param) in request.params.iter().enumerate() {
            match param {
                Param::U8(v) => payload.put_u8(*v),
                Param::U16(v) => payload.put_u16(*v),
                Param::U32(v) => {
                    let narrow = u16::try_from(*v)
                        .map_err(|_| out_of_range(index, u64::from(*v), u64::from(u16::MAX)))?;
                    payload.put_u16(narrow);
                }
                Param::F32(_) => {
                    return Err(EncodingError::Unsupported {
                        protocol: FAMILY,
                        what: "floating-point parameters",
                    })
                }
                Param::Bytes(b) => payload.put_slice(b),
            }
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(EncodingError::PayloadTooLarge {
                protocol: FAMILY,
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len() + 1);
        // Both bounded above.
        frame.put_u8(opcode as u8);
        frame.put_u8(payload.len() as u8);
        frame.put_slice(&payload);
        let xor = xor8(&frame);
        frame.put_u8(xor);
        Ok(frame.to_vec())
    }

    fn decode(&self, request: &Request, frame: &[u8]) -> Result<Response, ProtocolError> {
        let (&[opcode, len], rest) = frame.split_first_chunk::<HEADER_LEN>().ok_or_else(|| {
            ProtocolError::malformed(FAMILY, format!("reply of {} bytes is too short", frame.len()))
        })?;
        let len = usize::from(len);
        if rest.len() != len + 1 {
            return Err(ProtocolError::malformed(
                FAMILY,
                format!(
                    "length byte announces {} payload bytes, frame carries {}",
                    len,
                    rest.len().saturating_sub(1)
                ),
            ));
        }

        let (body, carried) = frame.split_at(frame.len() - 1);
        let computed = xor8(body);
        if computed != carried[0] {
            return Err(ProtocolError::ChecksumMismatch {
                protocol: FAMILY,
                computed: u32::from(computed),
                carried: u32::from(carried[0]),
            });
        }

        let payload = &rest[..len];
        if opcode & NAK_BIT != 0 {
            return Err(ProtocolError::Status {
                protocol: FAMILY,
                code: payload.first().copied().map(u32::from).unwrap_or(0),
            });
        }
        if u32::from(opcode) != request.opcode.0 {
            return Err(ProtocolError::malformed(
                FAMILY,
                format!("reply is for opcode {:#04x}, expected {}", opcode, request.opcode),
            ));
        }
        if let Reply::Fixed { len: want, .. } = request.reply {
            if payload.len() != want {
                return Err(ProtocolError::malformed(
                    FAMILY,
                    format!("reply carries {} payload bytes, expected {}", payload.len(), want),
                ));
            }
        }

        Ok(Response::new(FAMILY, request.opcode, payload.to_vec()))
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
        let remainder = usize::from(frame[1]) + 1;
        let rest = tx.read_exact(request.reply_endpoint, remainder, timeout)?;
        frame.extend_from_slice(&rest);
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_big_endian_with_xor() {
        let req = Request::new(0x02).param(Param::U32(100));
        let frame = CompactSerial.encode(&req).unwrap();
        assert_eq!(frame, vec![0x02, 0x02, 0x00, 0x64, 0x02 ^ 0x02 ^ 0x64]);
    }

    #[test]
    fn wide_u32_parameter_is_rejected() {
        let req = Request::new(0x02).param(Param::U32(70_000));
        assert_eq!(
            CompactSerial.encode(&req).unwrap_err(),
            EncodingError::ParameterOutOfRange {
                protocol: FAMILY,
                index: 0,
                value: 70_000,
                max: 0xFFFF
            }
        );
    }

    #[test]
    fn payload_limit_and_opcode_range() {
        let req = Request::new(0x03).param(Param::Bytes(vec![0; 256]));
        assert!(matches!(
            CompactSerial.encode(&req).unwrap_err(),
            EncodingError::PayloadTooLarge { len: 256, .. }
        ));
        assert!(CompactSerial.encode(&Request::new(0x80)).is_err());
    }

    #[test]
    fn integration_time_reply() {
        let req = Request::new(0x01).expect(Reply::fixed(2));
        let resp = CompactSerial
            .decode(&req, &[0x01, 0x02, 0x00, 0x64, 0x67])
            .unwrap();
        assert_eq!(resp.u16_be_at(0).unwrap(), 100);
    }

    #[test]
    fn corrupted_checksum() {
        let req = Request::new(0x01).expect(Reply::fixed(2));
        let err = CompactSerial
            .decode(&req, &[0x01, 0x02, 0x00, 0x64, 0x00])
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ChecksumMismatch {
                protocol: FAMILY,
                computed: 0x67,
                carried: 0x00
            }
        );
    }

    #[test]
    fn nak_carries_status() {
        let req = Request::new(0x01).expect(Reply::Frame);
        let body = [0x81, 0x01, 0x07];
        let frame = [body[0], body[1], body[2], xor8(&body)];
        assert!(matches!(
            CompactSerial.decode(&req, &frame).unwrap_err(),
            ProtocolError::Status { code: 7, .. }
        ));
    }

    #[test]
    fn short_and_inconsistent_frames() {
        let req = Request::new(0x01).expect(Reply::Frame);
        assert!(CompactSerial.decode(&req, &[]).is_err());
        assert!(CompactSerial.decode(&req, &[0x01]).is_err());
        assert!(CompactSerial.decode(&req, &[0x01, 0x05, 0x00, 0x04]).is_err());
    }
}
