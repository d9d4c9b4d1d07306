//! Error taxonomy shared by every layer.
//!
//! Each layer raises its own kind and hands it upward untouched:
//!
//! - **[`BusError`]**: raised by a transport channel (`NotOpen`, `Timeout`, `Io`).
//! - **[`ProtocolError`]**: raised while decoding a frame (`Malformed`,
//!   `ChecksumMismatch`, `Status`).
//! - **[`EncodingError`]**: raised while encoding a request whose opcode or
//!   parameters do not fit the family's fields.
//! - **[`SpectroError`]**: the root type every public operation returns. It wraps
//!   the three kinds above via `#[from]` and adds the capability outcomes
//!   (`FeatureNotSupported`, `BusNotSupported`) plus a few feature-level kinds.
//!
//! The capability outcomes are expected results of probing a device for an
//! optional feature. They are never produced by a transport fault, and
//! [`SpectroError::is_capability_probe`] lets callers tell them apart.
//!
//! # Example
//!
//! ```rust
//! use spectro_core::error::{BusError, SpectroError};
//! use spectro_core::family::BusFamily;
//! use std::time::Duration;
//!
//! let err: SpectroError = BusError::Timeout {
//!     bus: BusFamily::Usb,
//!     expected: 64,
//!     received: 12,
//!     timeout: Duration::from_millis(500),
//! }
//! .into();
//!
//! // Timeouts are the one kind worth retrying.
//! assert!(err.is_transient());
//! ```

use crate::family::{BusFamily, FeatureFamily, ProtocolFamily};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Bus Errors
// =============================================================================

/// Failure raised by a transport channel.
#[derive(Error, Debug)]
pub enum BusError {
    /// The channel was used before `open` or after `close`.
    #[error("{bus} channel is not open")]
    NotOpen { bus: BusFamily },

    /// `read_exact` did not receive the full byte count before its deadline.
    #[error("{bus} read timed out after {timeout:?}: received {received} of {expected} bytes")]
    Timeout {
        bus: BusFamily,
        expected: usize,
        received: usize,
        timeout: Duration,
    },

    /// The medium itself failed (device unplugged, short write, driver error).
    #[error("{bus} I/O failure: {source}")]
    Io {
        bus: BusFamily,
        #[source]
        source: std::io::Error,
    },
}

impl BusError {
    /// Wrap an I/O error raised by the medium.
    pub fn io(bus: BusFamily, source: std::io::Error) -> Self {
        Self::Io { bus, source }
    }

    /// Build an I/O failure from a plain message.
    pub fn io_message(bus: BusFamily, message: impl Into<String>) -> Self {
        Self::Io {
            bus,
            source: std::io::Error::new(std::io::ErrorKind::Other, message.into()),
        }
    }

    /// Bus the error was raised on.
    pub fn bus(&self) -> BusFamily {
        match self {
            Self::NotOpen { bus } | Self::Timeout { bus, .. } | Self::Io { bus, .. } => *bus,
        }
    }
}

// =============================================================================
// Protocol Errors
// =============================================================================

/// Failure raised while decoding a reply frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Framing markers, lengths, or reserved fields did not match the family's layout.
    #[error("{protocol} malformed frame: {reason}")]
    Malformed {
        protocol: ProtocolFamily,
        reason: String,
    },

    /// The frame was structurally sound but its checksum did not verify.
    #[error("{protocol} checksum mismatch: computed {computed:#06x}, frame carried {carried:#06x}")]
    ChecksumMismatch {
        protocol: ProtocolFamily,
        computed: u32,
        carried: u32,
    },

    /// The device answered with a command-level failure status.
    #[error("{protocol} device reported status {code:#06x}")]
    Status { protocol: ProtocolFamily, code: u32 },
}

impl ProtocolError {
    /// Shorthand for a [`ProtocolError::Malformed`].
    pub fn malformed(protocol: ProtocolFamily, reason: impl Into<String>) -> Self {
        Self::Malformed {
            protocol,
            reason: reason.into(),
        }
    }

    /// Protocol family that raised the error.
    pub fn protocol(&self) -> ProtocolFamily {
        match self {
            Self::Malformed { protocol, .. }
            | Self::ChecksumMismatch { protocol, .. }
            | Self::Status { protocol, .. } => *protocol,
        }
    }
}

// =============================================================================
// Encoding Errors
// =============================================================================

/// Failure raised while encoding a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Opcode does not fit the family's opcode field.
    #[error("{protocol} cannot encode opcode {opcode:#x}: field holds at most {max:#x}")]
    OpcodeOutOfRange {
        protocol: ProtocolFamily,
        opcode: u32,
        max: u32,
    },

    /// A parameter exceeds the family's field width.
    #[error("{protocol} parameter #{index} value {value} exceeds field maximum {max}")]
    ParameterOutOfRange {
        protocol: ProtocolFamily,
        index: usize,
        value: u64,
        max: u64,
    },

    /// The encoded parameters exceed the family's payload limit.
    #[error("{protocol} payload of {len} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge {
        protocol: ProtocolFamily,
        len: usize,
        max: usize,
    },

    /// The family has no representation for the requested construct.
    #[error("{protocol} cannot encode {what}")]
    Unsupported {
        protocol: ProtocolFamily,
        what: &'static str,
    },
}

// =============================================================================
// Root Error
// =============================================================================

/// Coarse classification used to decide between retry and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Medium failure or closed channel
    Bus,
    /// Read deadline expired
    Timeout,
    /// Reply failed validation
    Protocol,
    /// Request did not fit the wire format
    Encoding,
    /// Feature or bus absent on this model
    Unsupported,
    /// Channel held by another caller
    Busy,
    /// Argument outside model limits
    InvalidParameter,
    /// Inconsistent model or configuration
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Bus => "bus",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Busy => "busy",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{}", label)
    }
}

/// Convenience alias for results using the root error type.
pub type SpectroResult<T> = std::result::Result<T, SpectroError>;

/// Root error type returned by every public device and feature operation.
#[derive(Error, Debug)]
pub enum SpectroError {
    /// Transport-level failure.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Reply decoding failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Request encoding failure.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The model never implements this feature over the queried bus.
    ///
    /// This is a checkable outcome of capability probing, not a fault.
    #[error("{model} does not implement the {feature} feature over {bus}")]
    FeatureNotSupported {
        model: String,
        feature: FeatureFamily,
        bus: BusFamily,
    },

    /// The model exposes no feature at all over this bus.
    #[error("{model} exposes no features over {bus}")]
    BusNotSupported { model: String, bus: BusFamily },

    /// Another transaction holds the channel and the caller asked not to wait.
    #[error("{bus} channel is busy with another transaction")]
    DeviceBusy { bus: BusFamily },

    /// A feature argument lies outside the model's limits.
    #[error("{feature}: {reason}")]
    InvalidParameter {
        feature: FeatureFamily,
        reason: String,
    },

    /// A model or configuration record is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No model descriptor matches the requested name or product id.
    #[error("Unknown device model: {0}")]
    UnknownModel(String),
}

impl SpectroError {
    /// Shorthand for an [`SpectroError::InvalidParameter`].
    pub fn invalid(feature: FeatureFamily, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            feature,
            reason: reason.into(),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bus(BusError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Bus(_) => ErrorKind::Bus,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::FeatureNotSupported { .. } | Self::BusNotSupported { .. } => {
                ErrorKind::Unsupported
            }
            Self::DeviceBusy { .. } => ErrorKind::Busy,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::Configuration(_) | Self::UnknownModel(_) => ErrorKind::Configuration,
        }
    }

    /// True for failures that may succeed when repeated unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Busy)
    }

    /// True for the "capability absent" outcomes of probing a device.
    pub fn is_capability_probe(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }

    /// Protocol error carried by this value, if any.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }

    /// Bus error carried by this value, if any.
    pub fn as_bus(&self) -> Option<&BusError> {
        match self {
            Self::Bus(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient_and_keeps_bus() {
        let err: SpectroError = BusError::Timeout {
            bus: BusFamily::Rs232,
            expected: 5,
            received: 2,
            timeout: Duration::from_millis(100),
        }
        .into();
        assert!(err.is_transient());
        assert_eq!(err.as_bus().map(BusError::bus), Some(BusFamily::Rs232));
        assert!(err.to_string().contains("received 2 of 5"));
    }

    #[test]
    fn test_capability_outcomes_are_not_faults() {
        let err = SpectroError::FeatureNotSupported {
            model: "USB2000".into(),
            feature: FeatureFamily::ThermoElectric,
            bus: BusFamily::Usb,
        };
        assert!(err.is_capability_probe());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "USB2000 does not implement the TEC feature over USB"
        );
    }

    #[test]
    fn test_checksum_error_display() {
        let err = SpectroError::from(ProtocolError::ChecksumMismatch {
            protocol: ProtocolFamily::CompactSerial,
            computed: 0x67,
            carried: 0x00,
        });
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_io_message_is_bus_kind() {
        let err = SpectroError::from(BusError::io_message(BusFamily::Usb, "pipe stalled"));
        assert_eq!(err.kind(), ErrorKind::Bus);
        assert!(!err.is_transient());
    }
}
