//! Ethernet channel over a plain TCP socket.

use crate::io::{drain_reader, read_exact_within, ZeroRead};
use spectro_core::bus::{ChannelConfig, Endpoint, TransportChannel};
use spectro_core::error::BusError;
use spectro_core::family::BusFamily;
use spectro_core::limits::DRAIN_QUIET_PERIOD;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

const BUS: BusFamily = BusFamily::Ethernet;

/// TCP socket channel. The endpoint argument is ignored.
#[derive(Debug)]
pub struct TcpChannel {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl TcpChannel {
    /// A closed channel for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut TcpStream, BusError> {
        self.stream.as_mut().ok_or(BusError::NotOpen { bus: BUS })
    }
}

impl TransportChannel for TcpChannel {
    fn bus(&self) -> BusFamily {
        BUS
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    fn open(&mut self, config: &ChannelConfig) -> Result<(), BusError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let addrs: Vec<_> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BusError::io(BUS, e))?
            .collect();

        let mut last_err =
            io::Error::new(io::ErrorKind::AddrNotAvailable, "host resolved to no address");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.read_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(|e| BusError::io(BUS, e))?;
                    stream
                        .set_write_timeout(Some(config.write_timeout))
                        .map_err(|e| BusError::io(BUS, e))?;
                    info!(%addr, "TCP channel connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    debug!(%addr, error = %e, "TCP connect attempt failed");
                    last_err = e;
                }
            }
        }
        Err(BusError::io(BUS, last_err))
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) -> Result<(), BusError> {
        if let Some(stream) = self.stream.take() {
            // Peer may already be gone.
            let _ = stream.shutdown(Shutdown::Both);
            debug!(target_addr = %self.describe(), "TCP channel closed");
        }
        Ok(())
    }

    fn write(&mut self, _endpoint: Endpoint, bytes: &[u8]) -> Result<usize, BusError> {
        let stream = self.stream()?;
        stream.write_all(bytes).map_err(|e| BusError::io(BUS, e))?;
        stream.flush().map_err(|e| BusError::io(BUS, e))?;
        Ok(bytes.len())
    }

    fn read_exact(
        &mut self,
        _endpoint: Endpoint,
        len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, BusError> {
        let stream = self.stream()?;
        read_exact_within(BUS, stream, len, timeout, ZeroRead::Eof, |s, left| {
            s.set_read_timeout(Some(left))
        })
    }

    fn clear_input(&mut self) -> Result<usize, BusError> {
        let stream = self.stream()?;
        stream
            .set_read_timeout(Some(DRAIN_QUIET_PERIOD))
            .map_err(|e| BusError::io(BUS, e))?;
        Ok(drain_reader(stream, 64 * 1024))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_exchange_with_local_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut cmd = [0u8; 2];
            sock.read_exact(&mut cmd).unwrap();
            sock.write_all(&[cmd[0], cmd[1], 0xAA]).unwrap();
        });

        let mut channel = TcpChannel::new("127.0.0.1", port);
        channel.open(&ChannelConfig::default()).unwrap();
        assert_eq!(channel.write(Endpoint::Control, &[0x10, 0x20]).unwrap(), 2);
        let reply = channel
            .read_exact(Endpoint::Control, 3, Duration::from_secs(2))
            .unwrap();
        assert_eq!(reply, vec![0x10, 0x20, 0xAA]);
        peer.join().unwrap();
        channel.close().unwrap();
        assert!(!channel.is_open());
    }

    #[test]
    fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let peer = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(200));
            drop(sock);
        });

        let mut channel = TcpChannel::new("127.0.0.1", port);
        channel.open(&ChannelConfig::default()).unwrap();
        let err = channel
            .read_exact(Endpoint::Control, 4, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout { expected: 4, .. }));
        peer.join().unwrap();
    }

    #[test]
    fn test_not_open() {
        let mut channel = TcpChannel::new("127.0.0.1", 1);
        assert!(matches!(
            channel.clear_input(),
            Err(BusError::NotOpen { bus: BusFamily::Ethernet })
        ));
    }
}
