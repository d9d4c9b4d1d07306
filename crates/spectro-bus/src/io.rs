//! Blocking read helpers shared by the stream-oriented channels.

use spectro_core::error::BusError;
use spectro_core::family::BusFamily;
use spectro_core::limits::DRAIN_QUIET_PERIOD;
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// How a zero-length read is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ZeroRead {
    /// The peer closed the stream (TCP).
    Eof,
    /// Nothing arrived yet (some serial drivers).
    Retry,
}

/// Read exactly `len` bytes from `reader` before `timeout` elapses.
///
/// `set_timeout` is called before every read with the time left until the
/// deadline so a silent device cannot block past it. Bytes received before a
/// timeout are discarded together with the error.
pub(crate) fn read_exact_within<R, F>(
    bus: BusFamily,
    reader: &mut R,
    len: usize,
    timeout: Duration,
    zero_read: ZeroRead,
    mut set_timeout: F,
) -> Result<Vec<u8>, BusError>
where
    R: Read + ?Sized,
    F: FnMut(&mut R, Duration) -> io::Result<()>,
{
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        let now = Instant::now();
        if now >= deadline {
            return Err(BusError::Timeout {
                bus,
                expected: len,
                received: filled,
                timeout,
            });
        }
        set_timeout(reader, deadline - now).map_err(|e| BusError::io(bus, e))?;

        match reader.read(&mut buf[filled..]) {
            Ok(0) if zero_read == ZeroRead::Eof => {
                return Err(BusError::io(
                    bus,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer"),
                ));
            }
            Ok(n) => filled += n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(BusError::io(bus, e)),
        }
    }

    Ok(buf)
}

/// Drain stale bytes from `reader` until it stays quiet for one read.
///
/// The caller must have configured a short read timeout
/// (see [`DRAIN_QUIET_PERIOD`]); a timeout or would-block ends the drain.
/// Stops after `limit` bytes so a streaming device cannot pin the caller.
pub(crate) fn drain_reader<R: Read + ?Sized>(reader: &mut R, limit: usize) -> usize {
    let mut scratch = [0u8; 256];
    let mut discarded = 0;
    let started = Instant::now();

    while discarded < limit {
        match reader.read(&mut scratch) {
            Ok(0) => break,
            Ok(n) => discarded += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
        if started.elapsed() > DRAIN_QUIET_PERIOD * 20 {
            break;
        }
    }

    discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out one byte per call, then times out.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.data.len() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "quiet"));
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn test_assembles_fragmented_reads() {
        let mut r = Trickle {
            data: vec![1, 2, 3, 4],
            pos: 0,
        };
        let got = read_exact_within(
            BusFamily::Rs232,
            &mut r,
            3,
            Duration::from_millis(200),
            ZeroRead::Retry,
            |_, _| Ok(()),
        )
        .unwrap();
        assert_eq!(got, vec![1, 2, 3]);
        assert_eq!(r.pos, 3);
    }

    #[test]
    fn test_partial_read_times_out() {
        let mut r = Trickle {
            data: vec![7],
            pos: 0,
        };
        let err = read_exact_within(
            BusFamily::Rs232,
            &mut r,
            4,
            Duration::from_millis(20),
            ZeroRead::Retry,
            |_, _| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BusError::Timeout {
                expected: 4,
                received: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_eof_is_io_failure() {
        let mut r = Cursor::new(Vec::<u8>::new());
        let err = read_exact_within(
            BusFamily::Ethernet,
            &mut r,
            2,
            Duration::from_millis(20),
            ZeroRead::Eof,
            |_, _| Ok(()),
        )
        .unwrap_err();
        assert!(matches!(err, BusError::Io { .. }));
    }

    #[test]
    fn test_drain_counts_and_respects_limit() {
        let mut r = Cursor::new(vec![0u8; 1000]);
        assert_eq!(drain_reader(&mut r, 4096), 1000);

        let mut r = Cursor::new(vec![0u8; 1000]);
        assert!(drain_reader(&mut r, 300) < 1000);
    }
}
