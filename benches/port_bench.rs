//! Performance benchmarks for cycleport channels.
//!
//! Run with: `cargo bench`
//! Or for specific bench: `cargo bench --bench port_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cycleport::{
    DamQueue, Port, PortRegistry, ReadPort, ReadSkidPort, WritePort, WriteSkidPort,
};

const STREAM_CYCLES: u64 = 1000;

// ============================================================================
// Channel Benchmarks
// ============================================================================

fn bench_strict_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("strict_stream");

    for latency in [0u32, 2, 8].iter() {
        group.throughput(Throughput::Elements(STREAM_CYCLES));
        group.bench_with_input(BenchmarkId::new("latency", latency), latency, |b, &latency| {
            let registry = PortRegistry::new();
            let mut tx = WritePort::<u64>::new(&registry);
            tx.init_config("stream", 1, latency, 0).unwrap();
            let mut rx = ReadPort::<u64>::new(&registry);
            rx.init("stream", 1, 0).unwrap();
            registry.connect_all().unwrap();

            let lat = u64::from(latency);
            b.iter(|| {
                for cycle in 0..STREAM_CYCLES {
                    tx.write(cycle, cycle).unwrap();
                    if cycle >= lat {
                        black_box(rx.read(cycle).unwrap());
                    }
                }
                registry.clear_all();
            });
        });
    }

    group.finish();
}

fn bench_bandwidth(c: &mut Criterion) {
    let mut group = c.benchmark_group("skid_bandwidth");

    for bandwidth in [1u32, 4, 16].iter() {
        let items = STREAM_CYCLES * u64::from(*bandwidth);
        group.throughput(Throughput::Elements(items));
        group.bench_with_input(
            BenchmarkId::new("bandwidth", bandwidth),
            bandwidth,
            |b, &bandwidth| {
                let registry = PortRegistry::new();
                let mut tx = WriteSkidPort::<u64>::new(&registry);
                tx.init_config("wide", bandwidth, 1, 0).unwrap();
                let mut rx = ReadSkidPort::<u64>::new(&registry);
                rx.init("wide", 1, 0).unwrap();
                registry.connect_all().unwrap();

                b.iter(|| {
                    for cycle in 0..STREAM_CYCLES {
                        for i in 0..bandwidth {
                            tx.write(u64::from(i), cycle).unwrap();
                        }
                        while let Some(item) = rx.read(cycle).unwrap() {
                            black_box(item);
                        }
                    }
                    registry.clear_all();
                });
            },
        );
    }

    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for fanout in [1usize, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(STREAM_CYCLES * *fanout as u64));
        group.bench_with_input(BenchmarkId::new("fanout", fanout), fanout, |b, &fanout| {
            let registry = PortRegistry::new();
            let mut tx = WritePort::<u64>::new(&registry);
            tx.init_config("bus", 1, 1, 0).unwrap();
            tx.set_fanout(fanout).unwrap();
            let readers: Vec<_> = (0..fanout)
                .map(|i| {
                    let mut rx = ReadPort::<u64>::new(&registry);
                    rx.init("bus", i as u64, 0).unwrap();
                    rx
                })
                .collect();
            registry.connect_all().unwrap();

            b.iter(|| {
                for cycle in 0..STREAM_CYCLES {
                    tx.write(cycle, cycle).unwrap();
                    if cycle >= 1 {
                        for rx in &readers {
                            black_box(rx.read(cycle).unwrap());
                        }
                    }
                }
                registry.clear_all();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Setup Benchmarks
// ============================================================================

fn bench_connect_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("connect_all");

    for channels in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*channels as u64));
        group.bench_with_input(
            BenchmarkId::new("channels", channels),
            channels,
            |b, &channels| {
                let names: Vec<String> = (0..channels).map(|i| format!("ch{i}")).collect();
                b.iter(|| {
                    let registry = PortRegistry::new();
                    let mut ports = Vec::with_capacity(channels);
                    for name in names.iter().rev() {
                        let mut rx = ReadPort::<u32>::new(&registry);
                        rx.init(name, 1, 0).unwrap();
                        let mut tx = WritePort::<u32>::new(&registry);
                        tx.init_config(name, 1, 1, 0).unwrap();
                        ports.push((tx, rx));
                    }
                    black_box(registry.connect_all().unwrap());
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Slot Queue Benchmarks
// ============================================================================

fn bench_damqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("damqueue");

    for capacity in [8usize, 64].iter() {
        group.throughput(Throughput::Elements(STREAM_CYCLES));
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            capacity,
            |b, &capacity| {
                let mut q = DamQueue::new(capacity);
                b.iter(|| {
                    for i in 0..STREAM_CYCLES {
                        if q.is_full() {
                            // Retire every other entry out of order.
                            let slots: Vec<usize> = q.iter().map(|(slot, _)| slot).step_by(2).collect();
                            for slot in slots {
                                black_box(q.del_entry(slot));
                            }
                        }
                        black_box(q.store(i).ok());
                    }
                    q.clear();
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    benches,
    bench_strict_stream,
    bench_bandwidth,
    bench_fanout,
    bench_connect_all,
    bench_damqueue,
);

criterion_main!(benches);
