//! Shared hard limits and default timeouts.
//!
//! Centralized so the transports, protocols and features agree on the same
//! bounds, and so a corrupted length field can never drive an unbounded
//! allocation.

use std::time::Duration;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default deadline for a single `read_exact` (1 second).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default deadline for a single write (1 second).
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Margin added on top of the integration time when waiting for a spectrum.
///
/// A spectrum is not available until the detector has finished integrating,
/// so the read deadline is `integration + SPECTRUM_READ_MARGIN`.
pub const SPECTRUM_READ_MARGIN: Duration = Duration::from_secs(2);

/// How long an input drain keeps reading before it declares the line quiet.
pub const DRAIN_QUIET_PERIOD: Duration = Duration::from_millis(50);

// =============================================================================
// Size Limits
// =============================================================================

/// Maximum reply size accepted from any framed protocol (4 MiB).
///
/// Length fields announcing more than this are rejected as malformed before
/// any buffer is allocated.
pub const MAX_REPLY_BYTES: usize = 4 * 1024 * 1024;

/// Maximum number of pixels a spectrometer profile may declare.
pub const MAX_PIXELS: usize = 65_536;

/// Spectrum read deadline for a given integration time.
pub fn spectrum_timeout(integration: Duration) -> Duration {
    integration.saturating_add(SPECTRUM_READ_MARGIN)
}
