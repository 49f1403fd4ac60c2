//! Integration tests for channel timing.
//!
//! These tests verify the timing contract end to end:
//! - Latency and bandwidth of strict channels
//! - Relaxed draining on skid and stall channels
//! - Broadcast to several readers
//! - FIFO order, clearing and non-destructive peeking

use cycleport::{
    AccumulationPolicy, PeekPort, Port, PortError, PortRegistry, PortsConfigBuilder, ReadPort,
    ReadSkidPort, ReadStallPort, SetupError, WritePort, WriteSkidPort, WriteStallPort,
};

// ============================================================================
// Helpers
// ============================================================================

fn strict_channel<T: cycleport::Payload>(
    name: &str,
    bandwidth: u32,
    latency: u32,
) -> (PortRegistry, WritePort<T>, ReadPort<T>) {
    let registry = PortRegistry::new();
    let mut tx = WritePort::new(&registry);
    tx.init_config(name, bandwidth, latency, 1).unwrap();
    let mut rx = ReadPort::new(&registry);
    rx.init(name, 2, 0).unwrap();
    registry.connect_all().unwrap();
    (registry, tx, rx)
}

fn skid_channel(name: &str, bandwidth: u32, latency: u32) -> (PortRegistry, WriteSkidPort<u32>, ReadSkidPort<u32>) {
    let registry = PortRegistry::new();
    let mut tx = WriteSkidPort::new(&registry);
    tx.init_config(name, bandwidth, latency, 1).unwrap();
    let mut rx = ReadSkidPort::new(&registry);
    rx.init(name, 2, 0).unwrap();
    registry.connect_all().unwrap();
    (registry, tx, rx)
}

// ============================================================================
// Strict Channels
// ============================================================================

#[test]
fn test_item_visible_after_latency() {
    let (registry, tx, rx) = strict_channel::<String>("fetch_to_decode", 1, 2);

    tx.write("A".to_string(), 10).unwrap();
    assert_eq!(rx.read(11).unwrap(), None);
    assert_eq!(rx.read(12).unwrap(), Some("A".to_string()));
    assert_eq!(rx.read(13).unwrap(), None);

    let stats = registry.stats();
    let channel = &stats.channels[0];
    assert_eq!(channel.stats.items_written, 1);
    assert_eq!(channel.stats.items_read, 1);
    assert_eq!(channel.stats.soft_misses, 2);
}

#[test]
fn test_zero_latency_same_cycle() {
    let (_registry, tx, rx) = strict_channel::<u32>("bypass", 1, 0);

    tx.write(5, 3).unwrap();
    assert_eq!(rx.read(3).unwrap(), Some(5));
}

#[test]
fn test_bandwidth_per_cycle() {
    let (_registry, tx, rx) = strict_channel::<u32>("wide", 2, 1);

    tx.write(1, 0).unwrap();
    tx.write(2, 0).unwrap();
    assert!(!tx.writable(0));
    assert!(matches!(
        tx.write(3, 0),
        Err(PortError::BandwidthExceeded { cycle: 0, bandwidth: 2, .. })
    ));

    // A new cycle opens a new row.
    tx.write(3, 1).unwrap();

    assert_eq!(rx.read(1).unwrap(), Some(1));
    assert_eq!(rx.read(1).unwrap(), Some(2));
    assert_eq!(rx.read(1).unwrap(), None);
    assert_eq!(rx.read(2).unwrap(), Some(3));
}

#[test]
fn test_time_must_advance() {
    let (_registry, tx, _rx) = strict_channel::<u32>("mono", 1, 1);

    tx.write(1, 5).unwrap();
    let err = tx.write(2, 4).unwrap_err();
    assert_eq!(
        err,
        PortError::NonMonotonicWrite {
            port: "mono".to_string(),
            cycle: 4,
            last: 5,
        }
    );
    assert!(err.is_fatal());
}

#[test]
fn test_overrun_of_undrained_rows() {
    // latency 0 + 1 + margin 3 = 4 rows
    let (_registry, tx, _rx) = strict_channel::<u32>("ignored", 1, 0);

    for cycle in 0..4 {
        tx.write(cycle as u32, cycle).unwrap();
    }
    assert!(!tx.writable(4));
    assert!(matches!(
        tx.write(4, 4),
        Err(PortError::Overrun { cycle: 4, row: 0, .. })
    ));
}

#[test]
fn test_strict_reader_must_not_skip() {
    let (_registry, tx, rx) = strict_channel::<u32>("late", 1, 1);

    tx.write(1, 0).unwrap();
    assert!(matches!(
        rx.read(3),
        Err(PortError::WrongCycle {
            cycle: 3,
            expected: 1,
            ..
        })
    ));
}

#[test]
fn test_margin_from_config() {
    let config = PortsConfigBuilder::new().lookahead_margin(0).build().unwrap();
    let registry = PortRegistry::with_config(config);
    let mut tx = WritePort::<u32>::new(&registry);
    tx.init_config("tight", 1, 1, 0).unwrap();
    let mut rx = ReadPort::<u32>::new(&registry);
    rx.init("tight", 0, 0).unwrap();
    let report = registry.connect_all().unwrap();
    assert_eq!(report.wirings[0].rows, 2);

    tx.write(1, 0).unwrap();
    tx.write(2, 1).unwrap();
    assert!(matches!(tx.write(3, 2), Err(PortError::Overrun { .. })));

    assert_eq!(rx.read(1).unwrap(), Some(1));
    tx.write(3, 2).unwrap();
    assert_eq!(rx.read(2).unwrap(), Some(2));
    assert_eq!(rx.read(3).unwrap(), Some(3));
}

// ============================================================================
// Relaxed Channels
// ============================================================================

#[test]
fn test_fifo_across_skipped_cycles() {
    let (_registry, tx, rx) = skid_channel("fifo", 1, 1);

    for (cycle, value) in [(0, 10), (1, 11), (2, 12)] {
        tx.write(value, cycle).unwrap();
    }

    let mut drained = Vec::new();
    for cycle in 5..10 {
        if let Some(v) = rx.read(cycle).unwrap() {
            drained.push(v);
        }
    }
    assert_eq!(drained, vec![10, 11, 12]);
}

#[test]
fn test_overaccumulation_policy_error() {
    let registry = PortRegistry::new();
    let mut tx = WriteStallPort::<u32>::new(&registry);
    tx.init_config("acc", 1, 1, 0).unwrap();
    let mut rx = ReadStallPort::<u32>::new(&registry);
    rx.init("acc", 0, 0).unwrap();
    registry.connect_all().unwrap();

    // latency + 1 writes without a read, then a read in a quiet cycle.
    tx.write(1, 0).unwrap();
    tx.write(2, 1).unwrap();
    assert!(matches!(
        rx.read(3),
        Err(PortError::Overaccumulated { writes: 2, .. })
    ));
}

#[test]
fn test_overaccumulation_policy_warn() {
    let (_registry, tx, rx) = skid_channel("warned", 1, 1);

    tx.write(1, 0).unwrap();
    tx.write(2, 1).unwrap();
    assert_eq!(rx.read(3).unwrap(), Some(1));
    assert_eq!(rx.read(4).unwrap(), Some(2));
}

#[test]
fn test_stall_and_resume() {
    let registry = PortRegistry::new();
    let mut tx = WriteStallPort::<u32>::new(&registry);
    tx.init_config("backpressure", 1, 1, 0).unwrap();
    let mut rx = ReadStallPort::<u32>::new(&registry);
    rx.init("backpressure", 0, 0).unwrap();
    registry.connect_all().unwrap();

    let mut produced = 0u32;
    let mut consumed = Vec::new();
    for cycle in 0..12 {
        // The consumer holds the channel for cycles 3..=5.
        match cycle {
            3 => rx.stall(true).unwrap(),
            6 => rx.stall(false).unwrap(),
            _ => {}
        }
        if !rx.is_stalled().unwrap() {
            if let Some(v) = rx.read(cycle).unwrap() {
                consumed.push(v);
            }
        }
        if produced < 5 && tx.writable(cycle) {
            tx.write(produced, cycle).unwrap();
            produced += 1;
        }
    }

    assert_eq!(consumed, vec![0, 1, 2, 3, 4]);
    assert_eq!(registry.stats().channels[0].stats.stalls, 1);
}

// ============================================================================
// Broadcast
// ============================================================================

#[test]
fn test_broadcast_to_two_readers() {
    let registry = PortRegistry::new();
    let mut tx = WritePort::<u32>::new(&registry);
    tx.init_config("bus", 1, 1, 0).unwrap();
    tx.set_fanout(2).unwrap();
    let mut strict = ReadPort::<u32>::new(&registry);
    strict.init("bus", 1, 0).unwrap();
    let mut relaxed = ReadSkidPort::<u32>::new(&registry);
    relaxed.init("bus", 2, 0).unwrap();

    let report = registry.connect_all().unwrap();
    let wirings = report.find("bus", 0);
    assert_eq!(wirings.len(), 2);
    assert_eq!(wirings[0].reader_node, 1);
    assert_eq!(wirings[1].reader_node, 2);
    assert_eq!(wirings[1].fanout_index, 1);

    tx.write(7, 3).unwrap();
    assert_eq!(registry.occupancy(), 2);

    // Each reader drains its own copy.
    assert_eq!(strict.read(4).unwrap(), Some(7));
    assert_eq!(registry.occupancy(), 1);
    assert_eq!(relaxed.read(6).unwrap(), Some(7));
    assert_eq!(registry.occupancy(), 0);
}

#[test]
fn test_broadcast_blocked_by_slowest_reader() {
    let config = PortsConfigBuilder::new().lookahead_margin(0).build().unwrap();
    let registry = PortRegistry::with_config(config);
    let mut tx = WriteSkidPort::<u32>::new(&registry);
    tx.init_config("pair", 1, 0, 0).unwrap();
    tx.set_fanout(2).unwrap();
    let mut fast = ReadSkidPort::<u32>::new(&registry);
    fast.init("pair", 1, 0).unwrap();
    let mut slow = ReadSkidPort::<u32>::new(&registry);
    slow.init("pair", 2, 0).unwrap();
    registry.connect_all().unwrap();

    tx.write(1, 0).unwrap();
    assert_eq!(fast.read(0).unwrap(), Some(1));
    assert!(!tx.writable(1));

    assert_eq!(slow.read(0).unwrap(), Some(1));
    assert!(tx.writable(1));
}

#[test]
fn test_rejected_broadcast_reaches_no_reader() {
    let config = PortsConfigBuilder::new().lookahead_margin(0).build().unwrap();
    let registry = PortRegistry::with_config(config);
    let mut tx = WriteSkidPort::<u32>::new(&registry);
    tx.init_config("split", 1, 0, 0).unwrap();
    tx.set_fanout(2).unwrap();
    let mut fast = ReadSkidPort::<u32>::new(&registry);
    fast.init("split", 1, 0).unwrap();
    let mut slow = ReadSkidPort::<u32>::new(&registry);
    slow.init("split", 2, 0).unwrap();
    registry.connect_all().unwrap();

    tx.write(1, 0).unwrap();
    assert_eq!(fast.read(0).unwrap(), Some(1));

    // The slow reader's only row is still full, so nobody gets the item.
    assert!(matches!(
        tx.write(2, 1),
        Err(PortError::Overrun { cycle: 1, .. })
    ));
    assert_eq!(registry.occupancy(), 1);
    assert_eq!(fast.read(1).unwrap(), None);

    assert_eq!(slow.read(1).unwrap(), Some(1));
    tx.write(3, 1).unwrap();
    assert_eq!(fast.read(1).unwrap(), Some(3));
}

#[test]
fn test_stall_writer_has_no_fanout() {
    let registry = PortRegistry::new();
    let mut tx = WriteStallPort::<u32>::new(&registry);
    tx.init_config("held", 1, 1, 0).unwrap();
    assert!(matches!(
        tx.set_fanout(2),
        Err(SetupError::FanoutUnsupported { fanout: 2, .. })
    ));
    tx.set_fanout(1).unwrap();
}

// ============================================================================
// Clear and Peek
// ============================================================================

#[test]
fn test_clear_all_drops_everything() {
    let (registry, tx, rx) = skid_channel("flush", 2, 2);

    tx.write(1, 0).unwrap();
    tx.write(2, 0).unwrap();
    tx.write(3, 1).unwrap();
    assert_eq!(registry.occupancy(), 3);

    registry.clear_all();
    assert_eq!(registry.occupancy(), 0);
    assert!(!rx.something_to_read(100).unwrap());
    assert_eq!(rx.read(100).unwrap(), None);

    // The channel is usable again from any cycle.
    tx.write(4, 0).unwrap();
    assert_eq!(rx.read(2).unwrap(), Some(4));
}

#[test]
fn test_peek_does_not_change_reads() {
    let registry = PortRegistry::new();
    let mut tx = WritePort::<u32>::new(&registry);
    tx.init_config("watched", 2, 1, 0).unwrap();
    let mut rx = ReadPort::<u32>::new(&registry);
    rx.init("watched", 1, 0).unwrap();
    let mut peek = PeekPort::<u32>::new(&registry);
    peek.init("watched", 2, 0).unwrap();
    let report = registry.connect_all().unwrap();
    assert!(report.wirings[0].peeked);

    tx.write(1, 0).unwrap();
    tx.write(2, 0).unwrap();

    assert_eq!(peek.peek_next(1).unwrap(), Some(1));
    assert_eq!(peek.peek_next(1).unwrap(), Some(2));
    assert_eq!(peek.peek_next(1).unwrap(), None);

    assert_eq!(rx.read(1).unwrap(), Some(1));
    assert_eq!(rx.read(1).unwrap(), Some(2));
    assert_eq!(registry.occupancy(), 0);
}

#[test]
fn test_peek_position_kept_across_stall() {
    let config = PortsConfigBuilder::new()
        .stall_accumulation(AccumulationPolicy::Off)
        .build()
        .unwrap();
    let registry = PortRegistry::with_config(config);
    let mut tx = WriteStallPort::<u32>::new(&registry);
    tx.init_config("held", 2, 0, 0).unwrap();
    let mut rx = ReadStallPort::<u32>::new(&registry);
    rx.init("held", 1, 0).unwrap();
    let mut peek = PeekPort::<u32>::new(&registry);
    peek.init("held", 2, 0).unwrap();
    registry.connect_all().unwrap();

    tx.write(1, 0).unwrap();
    tx.write(2, 0).unwrap();
    assert_eq!(peek.peek_next(0).unwrap(), Some(1));

    // The stall postpones both items; the peek cursor stays past the first.
    rx.stall(true).unwrap();
    assert_eq!(peek.peek_next(0).unwrap(), None);
    assert_eq!(peek.peek_next(1).unwrap(), Some(2));
    assert_eq!(peek.peek_next(1).unwrap(), None);

    rx.stall(false).unwrap();
    assert_eq!(rx.read(1).unwrap(), Some(1));
    assert_eq!(rx.read(1).unwrap(), Some(2));
}
