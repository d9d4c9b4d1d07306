//! Retry policy for transient failures.
//!
//! Only timeouts and busy channels are retried; protocol and capability
//! errors are returned on the first occurrence since repeating the same
//! request cannot change them.

use crate::error::SpectroResult;
use std::time::Duration;
use tracing::warn;

/// How many times to retry a failed exchange and how long to wait in between.
///
/// # Example
///
/// ```rust
/// use spectro_core::error_recovery::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 5,
///     backoff_delay: Duration::from_millis(20),
///     multiplier: 2.0,
/// };
/// assert_eq!(policy.delay_for(2), Duration::from_millis(80));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub backoff_delay: Duration,

    /// Factor applied to the delay after every retry (1.0 = constant).
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_delay: Duration::from_millis(100),
            multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(64) as i32).min(1e6);
        let nanos = (self.backoff_delay.as_nanos() as f64 * factor).round();
        Duration::from_nanos(nanos.min(u64::MAX as f64) as u64)
    }
}

/// Run `operation`, retrying transient failures according to `policy`.
///
/// Non-transient errors and the last transient error are returned unchanged.
pub fn with_retry<T, F>(policy: &RetryPolicy, what: &str, mut operation: F) -> SpectroResult<T>
where
    F: FnMut() -> SpectroResult<T>,
{
    let mut retry = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry < policy.max_attempts => {
                let delay = policy.delay_for(retry);
                warn!(
                    operation = what,
                    attempt = retry + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                std::thread::sleep(delay);
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BusError, ProtocolError, SpectroError};
    use crate::family::{BusFamily, ProtocolFamily};

    fn timeout() -> SpectroError {
        BusError::Timeout {
            bus: BusFamily::Loopback,
            expected: 1,
            received: 0,
            timeout: Duration::from_millis(1),
        }
        .into()
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_delay: Duration::from_millis(1),
            multiplier: 1.0,
        }
    }

    #[tracing_test::traced_test]
    #[test]
    fn retries_timeouts_until_success() {
        let mut calls = 0;
        let value = with_retry(&fast(3), "probe", || {
            calls += 1;
            if calls < 3 {
                Err(timeout())
            } else {
                Ok(42)
            }
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 3);
        assert!(logs_contain("Transient failure, retrying"));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let err = with_retry(&fast(2), "probe", || -> SpectroResult<()> {
            calls += 1;
            Err(timeout())
        })
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls, 3);
    }

    #[test]
    fn protocol_errors_are_not_retried() {
        let mut calls = 0;
        let err = with_retry(&fast(5), "probe", || -> SpectroResult<()> {
            calls += 1;
            Err(ProtocolError::malformed(ProtocolFamily::OceanBinary, "bad footer").into())
        })
        .unwrap_err();
        assert!(err.as_protocol().is_some());
        assert_eq!(calls, 1);
    }

    #[test]
    fn exponential_delay() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_delay: Duration::from_millis(10),
            multiplier: 3.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(90));
    }
}
