//! Broadcast Example
//!
//! A dispatch unit broadcasts micro-ops to an ALU and a load/store unit.
//! Channel timing comes from a YAML configuration, a peek port lets a
//! scoreboard look ahead without consuming, and every move is recorded by
//! an event sink.

use std::sync::Arc;

use cycleport::{
    Cycle, ItemId, Payload, PeekPort, Port, PortRegistry, PortsConfig, ReadPort, ReadSkidPort,
    RecordingSink, WritePort,
};

const CONFIG: &str = r#"
ports:
  events_enabled: true
  skid_accumulation: off
  log_level: info
channels:
  - name: dispatch
    bandwidth: 2
    latency: 1
"#;

const SIMULATION_CYCLES: Cycle = 12;

#[derive(Clone, Debug, Default)]
struct MicroOp {
    seq: u64,
    is_memory: bool,
}

impl Payload for MicroOp {
    fn item_id(&self) -> Option<ItemId> {
        Some(self.seq)
    }
}

fn main() {
    let config = PortsConfig::from_yaml(CONFIG).unwrap();
    cycleport::init_logging(&config.ports.log_level);

    let sink = Arc::new(RecordingSink::new());
    let registry = PortRegistry::with_config(config).with_sink(sink.clone());

    let mut dispatch = WritePort::<MicroOp>::new(&registry);
    dispatch.init("dispatch", 1, 0).unwrap();
    dispatch.set_fanout(2).unwrap();

    let mut alu = ReadPort::<MicroOp>::new(&registry);
    alu.init("dispatch", 2, 0).unwrap();
    let mut lsu = ReadSkidPort::<MicroOp>::new(&registry);
    lsu.init("dispatch", 3, 0).unwrap();
    let mut scoreboard = PeekPort::<MicroOp>::new(&registry);
    scoreboard.init("dispatch", 4, 0).unwrap();

    let report = registry.connect_all().unwrap();
    println!("==== Broadcast example ====");
    for w in &report.wirings {
        println!(
            "{}#{} -> node {} ({}), edge {:?}, peeked {}",
            w.name, w.fanout_index, w.reader_node, w.reader, w.edge, w.peeked
        );
    }
    println!();

    let mut seq = 0;
    let mut alu_ops = 0;
    let mut lsu_ops = 0;
    for cycle in 0..SIMULATION_CYCLES {
        // The scoreboard sees what the ALU will receive, without taking it.
        scoreboard.peek_reset().unwrap();
        let mut visible = 0;
        while scoreboard.peek_next(cycle).unwrap().is_some() {
            visible += 1;
        }

        while let Some(op) = alu.read(cycle).unwrap() {
            if !op.is_memory {
                alu_ops += 1;
            }
        }
        // The LSU is blocked one cycle in four and drains a row per cycle.
        if cycle % 4 != 3 {
            while let Some(op) = lsu.read(cycle).unwrap() {
                if op.is_memory {
                    lsu_ops += 1;
                }
            }
        }

        if dispatch.writable(cycle) {
            for _ in 0..2 {
                let op = MicroOp {
                    seq,
                    is_memory: seq % 3 == 0,
                };
                dispatch.write(op, cycle).unwrap();
                seq += 1;
            }
        } else {
            println!("cycle {cycle:>2}: dispatch held back by the lsu");
        }
        println!("cycle {cycle:>2}: scoreboard saw {visible} ready ops");
    }

    println!();
    println!("alu executed {alu_ops}, lsu executed {lsu_ops}");
    println!("{} moves recorded on {} edges", sink.moves().len(), sink.edges().len());

    let stats = registry.export_stats();
    println!("{}", serde_json::to_string_pretty(&stats).unwrap());
}
