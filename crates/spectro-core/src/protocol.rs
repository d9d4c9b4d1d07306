//! Wire protocol contract and the request/response value types.
//!
//! A [`WireProtocol`] turns a typed [`Request`] into bytes for one protocol
//! family and turns reply bytes back into a [`Response`]. Features are written
//! against this trait only, never against a concrete family.
//!
//! Encoding and decoding are pure: no I/O, deterministic, and decoding never
//! panics on malformed input. [`WireProtocol::execute`] composes them around a
//! single [`Bus`] transaction:
//!
//! ```text
//! encode(request) ─► write ─► read_reply (fixed or header+remainder) ─► decode
//! ```

use crate::bus::{Bus, Endpoint, Transaction};
use crate::error::{EncodingError, ProtocolError, SpectroResult};
use crate::family::ProtocolFamily;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

// =============================================================================
// Request
// =============================================================================

/// Command identifier. Its width depends on the family (u8 for the legacy and
/// compact protocols, u32 message types for the binary protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u32);

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A typed request parameter. Each family serializes these with its own
/// byte order and field widths.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Single byte
    U8(u8),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit unsigned integer
    U32(u32),
    /// IEEE-754 single-precision float
    F32(f32),
    /// Raw bytes copied verbatim
    Bytes(Vec<u8>),
}

impl Param {
    /// Integer value of the parameter, if it is an integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U8(v) => Some(u64::from(*v)),
            Self::U16(v) => Some(u64::from(*v)),
            Self::U32(v) => Some(u64::from(*v)),
            Self::F32(_) | Self::Bytes(_) => None,
        }
    }
}

/// What the caller expects back from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reply {
    /// Nothing is read after the write.
    None,
    /// Framed families read an acknowledgement frame; unframed families read nothing.
    #[default]
    Ack,
    /// A self-describing data frame (framed families only).
    Frame,
    /// A reply of known size.
    ///
    /// Unframed families read exactly `len` bytes (plus one for `sync`); when
    /// `echo` is set the first byte must repeat the opcode and is stripped,
    /// and when `sync` is set the last byte must equal it and is stripped.
    /// Framed families read a frame and require a `len`-byte payload.
    Fixed {
        len: usize,
        echo: bool,
        sync: Option<u8>,
    },
}

impl Reply {
    /// A fixed reply with no echo or trailer.
    pub const fn fixed(len: usize) -> Self {
        Self::Fixed {
            len,
            echo: false,
            sync: None,
        }
    }
}

/// One command for the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command identifier
    pub opcode: Opcode,
    /// Typed parameters, in wire order
    pub params: Vec<Param>,
    /// Expected reply shape
    pub reply: Reply,
    /// Endpoint the reply is read from
    pub reply_endpoint: Endpoint,
}

impl Request {
    /// A request with no parameters expecting an acknowledgement.
    pub fn new(opcode: u32) -> Self {
        Self {
            opcode: Opcode(opcode),
            params: Vec::new(),
            reply: Reply::Ack,
            reply_endpoint: Endpoint::Control,
        }
    }

    /// Append a parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Set the expected reply shape.
    pub fn expect(mut self, reply: Reply) -> Self {
        self.reply = reply;
        self
    }

    /// Read the reply from `endpoint` instead of the control endpoint.
    pub fn reply_on(mut self, endpoint: Endpoint) -> Self {
        self.reply_endpoint = endpoint;
        self
    }
}

// =============================================================================
// Response
// =============================================================================

/// A decoded reply: the opcode it answers and its payload.
///
/// Typed accessors fail with [`ProtocolError::Malformed`] when the payload is
/// too short, so a truncated reply can never be read past its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    protocol: ProtocolFamily,
    opcode: Opcode,
    payload: Vec<u8>,
}

impl Response {
    /// Build a response.
    pub fn new(protocol: ProtocolFamily, opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            protocol,
            opcode,
            payload,
        }
    }

    /// A response with no payload (write-only commands).
    pub fn empty(protocol: ProtocolFamily, opcode: Opcode) -> Self {
        Self::new(protocol, opcode, Vec::new())
    }

    /// Family that decoded this response.
    pub fn protocol(&self) -> ProtocolFamily {
        self.protocol
    }

    /// Opcode this response answers.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    fn slice<const N: usize>(&self, offset: usize) -> Result<[u8; N], ProtocolError> {
        offset
            .checked_add(N)
            .and_then(|end| self.payload.get(offset..end))
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or_else(|| {
                ProtocolError::malformed(
                    self.protocol,
                    format!(
                        "payload of {} bytes too short for {}-byte field at offset {}",
                        self.payload.len(),
                        N,
                        offset
                    ),
                )
            })
    }

    /// Byte at `offset`.
    pub fn u8_at(&self, offset: usize) -> Result<u8, ProtocolError> {
        Ok(self.slice::<1>(offset)?[0])
    }

    /// Little-endian u16 at `offset`.
    pub fn u16_le_at(&self, offset: usize) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.slice(offset)?))
    }

    /// Big-endian u16 at `offset`.
    pub fn u16_be_at(&self, offset: usize) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.slice(offset)?))
    }

    /// Little-endian u32 at `offset`.
    pub fn u32_le_at(&self, offset: usize) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.slice(offset)?))
    }

    /// Big-endian u32 at `offset`.
    pub fn u32_be_at(&self, offset: usize) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.slice(offset)?))
    }

    /// Little-endian f32 at `offset`.
    pub fn f32_le_at(&self, offset: usize) -> Result<f32, ProtocolError> {
        Ok(f32::from_le_bytes(self.slice(offset)?))
    }

    /// Payload as ASCII text, stopping at the first NUL and trimming whitespace.
    pub fn ascii(&self) -> Result<String, ProtocolError> {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        let text = std::str::from_utf8(&self.payload[..end]).map_err(|_| {
            ProtocolError::malformed(self.protocol, "payload is not valid ASCII text")
        })?;
        Ok(text.trim().to_string())
    }
}

// =============================================================================
// WireProtocol
// =============================================================================

/// Encoder/decoder for one protocol family.
///
/// Implementations hold only immutable configuration (checksum kind, limits),
/// so every method takes `&self` and instances are `Send + Sync`.
pub trait WireProtocol: Send + Sync + fmt::Debug {
    /// Family this instance implements.
    fn family(&self) -> ProtocolFamily;

    /// Encode a request into one frame. Pure.
    fn encode(&self, request: &Request) -> Result<Vec<u8>, EncodingError>;

    /// Validate and decode a complete reply frame. Pure; never panics.
    fn decode(&self, request: &Request, frame: &[u8]) -> Result<Response, ProtocolError>;

    /// Read exactly one reply frame for `request`, or `None` if the request
    /// expects no reply on this family.
    ///
    /// Variable-length families read a fixed header first and then exactly
    /// the number of bytes its length field announces.
    fn read_reply(
        &self,
        tx: &mut Transaction<'_>,
        request: &Request,
        timeout: Duration,
    ) -> SpectroResult<Option<Vec<u8>>>;

    /// Encode, write, read and decode within one exclusive bus transaction.
    fn execute(&self, bus: &Bus, request: &Request, timeout: Duration) -> SpectroResult<Response> {
        execute_exchange(self, bus, request, timeout)
    }
}

/// Shared body of [`WireProtocol::execute`].
#[instrument(
    name = "execute",
    skip_all,
    fields(protocol = %protocol.family(), bus = %bus.family(), opcode = %request.opcode)
)]
pub fn execute_exchange<P>(
    protocol: &P,
    bus: &Bus,
    request: &Request,
    timeout: Duration,
) -> SpectroResult<Response>
where
    P: WireProtocol + ?Sized,
{
    let frame = protocol.encode(request)?;
    debug!(len = frame.len(), frame = %hex_preview(&frame), "tx");

    bus.transaction(|tx| {
        tx.write_all(Endpoint::Control, &frame)?;
        match protocol.read_reply(tx, request, timeout)? {
            None => Ok(Response::empty(protocol.family(), request.opcode)),
            Some(reply) => {
                debug!(len = reply.len(), frame = %hex_preview(&reply), "rx");
                Ok(protocol.decode(request, &reply)?)
            }
        }
    })
}

/// Compact hex rendering of a frame for logs, truncated after 32 bytes.
pub fn hex_preview(bytes: &[u8]) -> String {
    const LIMIT: usize = 32;
    let mut out = bytes
        .iter()
        .take(LIMIT)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > LIMIT {
        out.push_str(&format!(" … (+{} bytes)", bytes.len() - LIMIT));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(payload: &[u8]) -> Response {
        Response::new(ProtocolFamily::CompactSerial, Opcode(1), payload.to_vec())
    }

    #[test]
    fn typed_accessors_read_both_orders() {
        let r = response(&[0x00, 0x64, 0x10, 0x20, 0x30, 0x40]);
        assert_eq!(r.u16_be_at(0).unwrap(), 100);
        assert_eq!(r.u16_le_at(0).unwrap(), 0x6400);
        assert_eq!(r.u32_le_at(2).unwrap(), 0x4030_2010);
        assert_eq!(r.u32_be_at(2).unwrap(), 0x1020_3040);
    }

    #[test]
    fn short_payload_is_malformed_not_panic() {
        let r = response(&[0x01]);
        let err = r.u32_le_at(0).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
        assert!(r.u16_be_at(usize::MAX).is_err());
    }

    #[test]
    fn ascii_stops_at_nul() {
        let r = response(b"USB4C01234\0\0\0");
        assert_eq!(r.ascii().unwrap(), "USB4C01234");
    }

    #[test]
    fn request_builder_defaults() {
        let req = Request::new(0x05).param(Param::U8(3)).expect(Reply::fixed(17));
        assert_eq!(req.opcode, Opcode(5));
        assert_eq!(req.reply_endpoint, Endpoint::Control);
        assert_eq!(req.params, vec![Param::U8(3)]);
    }

    #[test]
    fn hex_preview_truncates() {
        assert_eq!(hex_preview(&[0x01, 0xab]), "01 ab");
        let long = vec![0u8; 40];
        assert!(hex_preview(&long).ends_with("(+8 bytes)"));
    }
}
