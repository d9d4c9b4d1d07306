//! Legacy OOI command set.
//!
//! Commands are a single opcode byte followed by little-endian parameters.
//! There is no reply framing: a reply is read only when the request declares
//! its exact size with [`Reply::Fixed`]. Query replies echo the opcode in
//! their first byte, and spectra end with a sync byte.

use bytes::{BufMut, BytesMut};
use spectro_core::bus::Transaction;
use spectro_core::error::{EncodingError, ProtocolError, SpectroResult};
use spectro_core::family::ProtocolFamily;
use spectro_core::limits::MAX_REPLY_BYTES;
use spectro_core::protocol::{Param, Reply, Request, Response, WireProtocol};
use std::time::Duration;

const FAMILY: ProtocolFamily = ProtocolFamily::OoiLegacy;

/// Longest command the firmware accepts.
pub const MAX_COMMAND_LEN: usize = 64;

/// Trailer byte terminating a spectrum transfer.
pub const SYNC_BYTE: u8 = 0x69;

/// Legacy OOI protocol instance. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct OoiLegacy;

impl OoiLegacy {
    /// New instance.
    pub fn new() -> Self {
        Self
    }

    fn reply_len(reply: &Reply) -> Option<usize> {
        match reply {
            Reply::Fixed { len, sync, .. } => Some(len + usize::from(sync.is_some())),
            Reply::None | Reply::Ack | Reply::Frame => None,
        }
    }
}

impl WireProtocol for OoiLegacy {
    fn family(&self) -> ProtocolFamily {
        FAMILY
    }

    fn encode(&self, request: &Request) -> Result<Vec<u8>, EncodingError> {
        let opcode = u8::try_from(request.opcode.0).map_err(|_| EncodingError::OpcodeOutOfRange {
            protocol: FAMILY,
            opcode: request.opcode.0,
            max: u32::from(u8::MAX),
        })?;
        if request.reply == Reply::Frame {
            return Err(EncodingError::Unsupported {
                protocol: FAMILY,
                what: "self-describing reply frames",
            });
        }
        if let Some(len) = Self::reply_len(&request.reply) {
            if len > MAX_REPLY_BYTES {
                return Err(EncodingError::PayloadTooLarge {
                    protocol: FAMILY,
                    len,
                    max: MAX_REPLY_BYTES,
                });
            }
        }

        let mut buf = BytesMut::with_capacity(MAX_COMMAND_LEN);
        buf.put_u8(opcode);
        for param in &request.params {
            match param {
                Param::U8(v) => buf.put_u8(*v),
                Param::U16(v) => buf.put_u16_le(*v),
                Param::U32(v) => buf.put_u32_le(*v),
                Param::F32(v) => buf.put_f32_le(*v),
                Param::Bytes(b) => buf.put_slice(b),
            }
        }
        if buf.len() > MAX_COMMAND_LEN {
            return Err(EncodingError::PayloadTooLarge {
                protocol: FAMILY,
                len: buf.len(),
                max: MAX_COMMAND_LEN,
            });
        }
        Ok(buf.to_vec())
    }

    fn decode(&self, request: &Request, frame: &[u8]) -> Result<Response, ProtocolError> {
        let Reply::Fixed { len, echo, sync } = request.reply else {
            if frame.is_empty() {
                return Ok(Response::empty(FAMILY, request.opcode));
            }
            return Err(ProtocolError::malformed(
                FAMILY,
                format!("{} unexpected reply bytes", frame.len()),
            ));
        };

        let expected = len + usize::from(sync.is_some());
        if frame.len() != expected {
            return Err(ProtocolError::malformed(
                FAMILY,
                format!("reply is {} bytes, expected {}", frame.len(), expected),
            ));
        }

        let mut start = 0;
        if echo && len == 0 {
            return Err(ProtocolError::malformed(FAMILY, "echoed reply declared empty"));
        }
        if echo {
            match frame.first() {
                Some(&b) if u32::from(b) == request.opcode.0 => start = 1,
                Some(&b) => {
                    return Err(ProtocolError::malformed(
                        FAMILY,
                        format!("reply echoes opcode {:#04x}, expected {}", b, request.opcode),
                    ))
                }
                None => return Err(ProtocolError::malformed(FAMILY, "empty echoed reply")),
            }
        }

        if let Some(sync) = sync {
            if frame[len] != sync {
                return Err(ProtocolError::malformed(
                    FAMILY,
                    format!("trailer byte {:#04x}, expected sync {:#04x}", frame[len], sync),
                ));
            }
        }

        Ok(Response::new(FAMILY, request.opcode, frame[start..len].to_vec()))
    }

    fn read_reply(
        &self,
        tx: &mut Transaction<'_>,
        request: &Request,
        timeout: Duration,
    ) -> SpectroResult<Option<Vec<u8>>> {
        match Self::reply_len(&request.reply) {
            Some(len) => Ok(Some(tx.read_exact(request.reply_endpoint, len, timeout)?)),
            None => Ok(None),
        }
    }
}
