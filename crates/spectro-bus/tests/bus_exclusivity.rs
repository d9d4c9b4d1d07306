//! Exchanges on one bus never interleave, and a timeout leaves nothing behind.

use spectro_bus::mock::{self, MockEvent};
use spectro_core::bus::{Bus, Endpoint};
use spectro_core::error::SpectroError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_test::traced_test;

const T: Duration = Duration::from_millis(500);

fn exchange(bus: &Bus, cmd: u8) -> Result<Vec<u8>, SpectroError> {
    bus.transaction(|tx| {
        tx.write_all(Endpoint::Control, &[cmd])?;
        Ok(tx.read_exact(Endpoint::Control, 2, T)?)
    })
}

#[test]
fn concurrent_exchanges_are_serialized() {
    let (channel, device) = mock::pair();
    device.set_read_delay(Duration::from_millis(5));
    for _ in 0..20 {
        device.expect_and_respond(&[0x10], &[0x10, 0xAA]);
    }
    let bus = Arc::new(Bus::from_channel(Box::new(channel), T).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    let reply = exchange(&bus, 0x10).unwrap();
                    assert_eq!(reply, vec![0x10, 0xAA]);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    // Every write is immediately followed by its own read.
    let events = device.events();
    assert_eq!(events.len(), 40);
    for pair in events.chunks(2) {
        assert_eq!(pair[0], MockEvent::Write(vec![0x10]));
        assert_eq!(pair[1], MockEvent::Read(2));
    }
    assert!(device.script_done());
}

#[traced_test]
#[test]
fn stale_input_is_drained_after_timeout() {
    let (channel, device) = mock::pair();
    device.expect_and_respond(&[0x01], &[]);
    device.expect_and_respond(&[0x02], &[0x02, 0x22]);
    let bus = Bus::from_channel(Box::new(channel), T).unwrap();

    let dev = device.clone();
    let err = bus
        .transaction(|tx| {
            tx.write_all(Endpoint::Control, &[0x01])?;
            // Reply arrives too late and in the wrong shape.
            let read = tx.read_exact(Endpoint::Control, 4, Duration::from_millis(20));
            dev.send_response(&[0xEE, 0xEE]);
            Ok(read?)
        })
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(device.pending(Endpoint::Control), 0);
    assert!(logs_contain("discarded pending input"));

    let reply = exchange(&bus, 0x02).unwrap();
    assert_eq!(reply, vec![0x02, 0x22]);
}
