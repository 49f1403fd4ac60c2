//! Integration tests for producers and consumers on separate threads.

use std::thread;
use std::time::Duration;

use cycleport::{
    CancelToken, Port, PortError, PortRegistry, PortsConfig, ReadPort, WaitOptions, WritePort,
};

const ITEMS: u64 = 200;

fn remote_pair(latency: u32) -> (PortRegistry, WritePort<u64>, ReadPort<u64>) {
    let registry = PortRegistry::new();
    let mut tx = WritePort::new(&registry);
    tx.init_config("cross_thread", 1, latency, 1).unwrap();
    let mut rx = ReadPort::new(&registry);
    rx.init("cross_thread", 2, 0).unwrap();
    registry.connect_all().unwrap();
    (registry, tx, rx)
}

// ============================================================================
// Producer / Consumer
// ============================================================================

#[test]
fn test_stream_between_threads() {
    let (registry, tx, rx) = remote_pair(2);
    let options = PortsConfig::default().remote.wait_options();

    let producer = {
        let options = options.clone();
        thread::spawn(move || {
            for cycle in 0..ITEMS {
                tx.write_remote(cycle * 10, cycle, &options).unwrap();
            }
        })
    };

    let consumer = thread::spawn(move || {
        let mut received = Vec::with_capacity(ITEMS as usize);
        for cycle in 0..ITEMS {
            let item = rx.read_remote(cycle + 2, &options).unwrap();
            received.push(item.unwrap());
        }
        received
    });

    producer.join().unwrap();
    let received = consumer.join().unwrap();

    assert_eq!(received.len(), ITEMS as usize);
    assert!(received.iter().enumerate().all(|(i, &v)| v == i as u64 * 10));

    let stats = registry.stats();
    assert_eq!(stats.total_written(), ITEMS);
    assert_eq!(stats.total_read(), ITEMS);
}

// ============================================================================
// Bounded Waits
// ============================================================================

#[test]
fn test_read_times_out() {
    let (_registry, _tx, rx) = remote_pair(1);
    let options = WaitOptions::new(Duration::from_millis(10));

    let err = rx.read_remote(1, &options).unwrap_err();
    assert!(matches!(err, PortError::WaitTimedOut { cycle: 1, .. }));
    assert!(!err.is_fatal());

    // The wait consumed nothing.
    assert_eq!(rx.read(1).unwrap(), None);
}

#[test]
fn test_write_times_out_on_full_ring() {
    let (_registry, tx, _rx) = remote_pair(0);
    let options = WaitOptions::new(Duration::from_millis(10));

    // latency 0 + 1 + default margin 3
    for cycle in 0..4 {
        tx.write_remote(cycle, cycle, &options).unwrap();
    }
    assert!(matches!(
        tx.write_remote(4, 4, &options),
        Err(PortError::WaitTimedOut { cycle: 4, .. })
    ));
}

#[test]
fn test_cancelled_wait() {
    let (_registry, _tx, rx) = remote_pair(1);
    let token = CancelToken::new();
    let options = WaitOptions::new(Duration::from_secs(30)).with_cancel(token.clone());

    let reader = thread::spawn(move || rx.read_remote(5, &options));
    thread::sleep(Duration::from_millis(5));
    token.cancel();

    let result = reader.join().unwrap();
    assert!(matches!(result, Err(PortError::WaitCancelled { cycle: 5, .. })));
}

#[test]
fn test_ports_are_send() {
    fn assert_send<T: Send>() {}
    assert_send::<WritePort<u64>>();
    assert_send::<ReadPort<u64>>();
    assert_send::<PortRegistry>();

    let (_registry, tx, _rx) = remote_pair(1);
    assert!(tx.is_connected());
}
