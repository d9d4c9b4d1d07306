//! Scripted in-memory channels for tests and simulators.
//!
//! [`pair`] creates a [`MockChannel`] (handed to the code under test, usually
//! boxed into a [`Bus`](spectro_core::bus::Bus)) and a [`MockDevice`] kept by
//! the test to script device behaviour:
//!
//! ```rust
//! use spectro_bus::mock;
//! use spectro_core::bus::{Endpoint, TransportChannel};
//! use std::time::Duration;
//!
//! let (mut channel, device) = mock::pair();
//! device.expect_and_respond(&[0x01], &[0x01, 0x02, 0x00, 0x64, 0x67]);
//!
//! channel.write(Endpoint::Control, &[0x01]).unwrap();
//! let reply = channel
//!     .read_exact(Endpoint::Control, 5, Duration::from_millis(50))
//!     .unwrap();
//! assert_eq!(reply[3], 0x64);
//! ```
//!
//! Scripted replies are released only once the channel has written the
//! expected bytes, so a single-threaded test can script first and run
//! afterwards. Unexpected writes fail with [`BusError::Io`].
//!
//! [`LoopbackChannel`] instead echoes every written byte back as input.

use parking_lot::{Condvar, Mutex};
use spectro_core::bus::{ChannelConfig, Endpoint, TransportChannel};
use spectro_core::error::BusError;
use spectro_core::family::BusFamily;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something observed on a mock channel, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// The channel wrote these bytes.
    Write(Vec<u8>),
    /// A `read_exact` of this many bytes completed successfully.
    Read(usize),
    /// A `read_exact` of this many bytes timed out.
    Timeout(usize),
    /// Pending input was discarded.
    Cleared(usize),
}

#[derive(Debug)]
struct Exchange {
    expected: Vec<u8>,
    reply: Vec<u8>,
    endpoint: Endpoint,
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    control: VecDeque<u8>,
    data: VecDeque<u8>,
    unmatched: Vec<u8>,
    script: VecDeque<Exchange>,
    events: Vec<MockEvent>,
    strict: bool,
    fail_writes: bool,
    read_delay: Duration,
}

impl MockState {
    fn queue(&mut self, endpoint: Endpoint) -> &mut VecDeque<u8> {
        match endpoint {
            Endpoint::Control => &mut self.control,
            Endpoint::Data => &mut self.data,
        }
    }

    /// Release every scripted reply whose expected bytes have been written.
    fn match_script(&mut self) -> Result<(), String> {
        while let Some(next) = self.script.front() {
            let want = next.expected.len();
            if self.unmatched.len() < want {
                let prefix = &next.expected[..self.unmatched.len()];
                if prefix != self.unmatched.as_slice() {
                    return Err(self.mismatch());
                }
                return Ok(());
            }
            if self.unmatched[..want] != next.expected[..] {
                return Err(self.mismatch());
            }
            self.unmatched.drain(..want);
            if let Some(exchange) = self.script.pop_front() {
                self.queue(exchange.endpoint).extend(exchange.reply);
            }
        }
        if self.strict && !self.unmatched.is_empty() {
            return Err(format!("unscripted write {:02x?}", self.unmatched));
        }
        Ok(())
    }

    fn mismatch(&self) -> String {
        let expected = self
            .script
            .front()
            .map(|e| e.expected.clone())
            .unwrap_or_default();
        format!(
            "unexpected write: expected {:02x?}, got {:02x?}",
            expected, self.unmatched
        )
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    input: Condvar,
}

/// Creates a connected channel/device pair. The channel starts open.
pub fn pair() -> (MockChannel, MockDevice) {
    let shared = Arc::new(Shared::default());
    {
        let mut state = shared.state.lock();
        state.open = true;
        state.strict = true;
    }
    (
        MockChannel {
            bus: BusFamily::Loopback,
            shared: shared.clone(),
        },
        MockDevice { shared },
    )
}

/// Creates a pair whose channel reports `bus` as its medium.
pub fn pair_on(bus: BusFamily) -> (MockChannel, MockDevice) {
    let (mut channel, device) = pair();
    channel.bus = bus;
    (channel, device)
}

/// Application side of a mock pair.
#[derive(Debug)]
pub struct MockChannel {
    bus: BusFamily,
    shared: Arc<Shared>,
}

impl TransportChannel for MockChannel {
    fn bus(&self) -> BusFamily {
        self.bus
    }

    fn describe(&self) -> String {
        format!("mock ({})", self.bus)
    }

    fn open(&mut self, _config: &ChannelConfig) -> Result<(), BusError> {
        self.shared.state.lock().open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.shared.state.lock().open
    }

    fn close(&mut self) -> Result<(), BusError> {
        self.shared.state.lock().open = false;
        self.shared.input.notify_all();
        Ok(())
    }

    fn write(&mut self, _endpoint: Endpoint, bytes: &[u8]) -> Result<usize, BusError> {
        let mut state = self.shared.state.lock();
        if !state.open {
            return Err(BusError::NotOpen { bus: self.bus });
        }
        if state.fail_writes {
            return Err(BusError::io_message(self.bus, "mock device disconnected"));
        }
        state.events.push(MockEvent::Write(bytes.to_vec()));
        state.unmatched.extend_from_slice(bytes);
        let matched = state.match_script();
        drop(state);
        self.shared.input.notify_all();
        matched.map_err(|reason| BusError::io_message(self.bus, reason))?;
        Ok(bytes.len())
    }

    fn read_exact(
        &mut self,
        endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        let delay = state.read_delay;
        if !delay.is_zero() {
            drop(state);
            std::thread::sleep(delay.min(timeout));
            state = self.shared.state.lock();
        }

        loop {
            if !state.open {
                return Err(BusError::NotOpen { bus: self.bus });
            }
            if state.queue(endpoint).len() >= len {
                let bytes: Vec<u8> = state.queue(endpoint).drain(..len).collect();
                state.events.push(MockEvent::Read(len));
                return Ok(bytes);
            }
            if self
                .shared
                .input
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                // Re-check once: input may have landed right at the deadline.
                if state.queue(endpoint).len() >= len {
                    continue;
                }
                let received = state.queue(endpoint).len().min(len);
                // Partial bytes are consumed with the failure.
                state.queue(endpoint).drain(..received);
                state.events.push(MockEvent::Timeout(len));
                return Err(BusError::Timeout {
                    bus: self.bus,
                    expected: len,
                    received,
                    timeout,
                });
            }
        }
    }

    fn clear_input(&mut self) -> Result<usize, BusError> {
        let mut state = self.shared.state.lock();
        let dropped = state.control.len() + state.data.len();
        state.control.clear();
        state.data.clear();
        if dropped > 0 {
            state.events.push(MockEvent::Cleared(dropped));
        }
        Ok(dropped)
    }
}

/// Test side of a mock pair.
#[derive(Debug, Clone)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl MockDevice {
    /// Queue `bytes` as input on `endpoint` immediately.
    pub fn send_response(&self, bytes: &[u8]) {
        self.send_on(Endpoint::Control, bytes);
    }

    /// Queue `bytes` as input on `endpoint` immediately.
    pub fn send_on(&self, endpoint: Endpoint, bytes: &[u8]) {
        self.shared.state.lock().queue(endpoint).extend(bytes.iter().copied());
        self.shared.input.notify_all();
    }

    /// Script one exchange: once the channel writes `expected`, `reply` becomes
    /// readable on the control endpoint.
    pub fn expect_and_respond(&self, expected: &[u8], reply: &[u8]) {
        self.expect_and_respond_on(expected, Endpoint::Control, reply);
    }

    /// Like [`expect_and_respond`](Self::expect_and_respond) with the reply on `endpoint`.
    pub fn expect_and_respond_on(&self, expected: &[u8], endpoint: Endpoint, reply: &[u8]) {
        self.shared.state.lock().script.push_back(Exchange {
            expected: expected.to_vec(),
            reply: reply.to_vec(),
            endpoint,
        });
    }

    /// Script a write that gets no reply.
    pub fn expect_write(&self, expected: &[u8]) {
        self.expect_and_respond(expected, &[]);
    }

    /// Accept any writes without a script.
    pub fn allow_unscripted_writes(&self) {
        self.shared.state.lock().strict = false;
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn fail_writes(&self) {
        self.shared.state.lock().fail_writes = true;
    }

    /// Delay every read by `delay` before it looks at the input queue.
    pub fn set_read_delay(&self, delay: Duration) {
        self.shared.state.lock().read_delay = delay;
    }

    /// Whether every scripted exchange has been consumed.
    pub fn script_done(&self) -> bool {
        self.shared.state.lock().script.is_empty()
    }

    /// All bytes written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.shared
            .state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Everything observed so far, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.state.lock().events.clone()
    }

    /// Bytes waiting to be read on `endpoint`.
    pub fn pending(&self, endpoint: Endpoint) -> usize {
        self.shared.state.lock().queue(endpoint).len()
    }
}

// =============================================================================
// LoopbackChannel
// =============================================================================

/// Channel whose input is whatever it last wrote.
///
/// Useful for round-tripping a protocol's own frames through a real
/// [`Bus`](spectro_core::bus::Bus) transaction.
#[derive(Debug)]
pub struct LoopbackChannel {
    open: bool,
    buffer: VecDeque<u8>,
}

impl LoopbackChannel {
    /// An open loopback channel.
    pub fn new() -> Self {
        Self {
            open: true,
            buffer: VecDeque::new(),
        }
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportChannel for LoopbackChannel {
    fn bus(&self) -> BusFamily {
        BusFamily::Loopback
    }

    fn describe(&self) -> String {
        "loopback".to_string()
    }

    fn open(&mut self, _config: &ChannelConfig) -> Result<(), BusError> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<(), BusError> {
        self.open = false;
        self.buffer.clear();
        Ok(())
    }

    fn write(&mut self, _endpoint: Endpoint, bytes: &[u8]) -> Result<usize, BusError> {
        if !self.open {
            return Err(BusError::NotOpen {
                bus: BusFamily::Loopback,
            });
        }
        self.buffer.extend(bytes.iter().copied());
        Ok(bytes.len())
    }

    fn read_exact(
        &mut self,
        _endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        if !self.open {
            return Err(BusError::NotOpen {
                bus: BusFamily::Loopback,
            });
        }
        if self.buffer.len() < len {
            // Nothing else can write while the caller is blocked here.
            let received = self.buffer.len();
            self.buffer.clear();
            return Err(BusError::Timeout {
                bus: BusFamily::Loopback,
                expected: len,
                received,
                timeout,
            });
        }
        Ok(self.buffer.drain(..len).collect())
    }

    fn clear_input(&mut self) -> Result<usize, BusError> {
        let n = self.buffer.len();
        self.buffer.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(50);

    #[test]
    fn test_scripted_reply_released_after_write() {
        let (mut channel, device) = pair();
        device.expect_and_respond(b"PING", b"PONG");
        assert_eq!(device.pending(Endpoint::Control), 0);

        channel.write(Endpoint::Control, b"PI").unwrap();
        assert_eq!(device.pending(Endpoint::Control), 0);
        channel.write(Endpoint::Control, b"NG").unwrap();
        assert_eq!(channel.read_exact(Endpoint::Control, 4, T).unwrap(), b"PONG");
        assert!(device.script_done());
    }

    #[test]
    fn test_unexpected_write_is_io_error() {
        let (mut channel, device) = pair();
        device.expect_and_respond(&[0x01], &[0x01]);
        let err = channel.write(Endpoint::Control, &[0x02]).unwrap_err();
        assert!(matches!(err, BusError::Io { .. }));
        assert!(err.to_string().contains("unexpected write"));
    }

    #[test]
    fn test_timeout_reports_partial_and_consumes_it() {
        let (mut channel, device) = pair();
        device.send_response(&[1, 2]);
        let err = channel.read_exact(Endpoint::Control, 3, T).unwrap_err();
        assert!(matches!(
            err,
            BusError::Timeout {
                expected: 3,
                received: 2,
                ..
            }
        ));
        assert_eq!(device.pending(Endpoint::Control), 0);
        assert_eq!(device.events(), vec![MockEvent::Timeout(3)]);
    }

    #[test]
    fn test_endpoints_are_separate_queues() {
        let (mut channel, device) = pair();
        device.send_on(Endpoint::Data, &[9, 9, 9]);
        assert!(channel.read_exact(Endpoint::Control, 1, T).is_err());
        assert_eq!(channel.read_exact(Endpoint::Data, 3, T).unwrap(), vec![9, 9, 9]);
    }

    #[test]
    fn test_reply_from_another_thread_wakes_reader() {
        let (mut channel, device) = pair();
        let feeder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            device.send_response(&[0xAB]);
        });
        let got = channel
            .read_exact(Endpoint::Control, 1, Duration::from_secs(2))
            .unwrap();
        assert_eq!(got, vec![0xAB]);
        feeder.join().unwrap();
    }

    #[test]
    fn test_loopback_echoes() {
        let mut channel = LoopbackChannel::new();
        channel.write(Endpoint::Control, &[1, 2, 3]).unwrap();
        assert_eq!(channel.read_exact(Endpoint::Control, 3, T).unwrap(), vec![1, 2, 3]);
        assert!(channel.read_exact(Endpoint::Control, 1, T).is_err());
    }
}
