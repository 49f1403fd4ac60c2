//! Three-Stage Pipeline Example
//!
//! This example models a tiny in-order core front end with:
//! - A fetch unit producing one instruction per cycle (strict channel)
//! - A decode unit forwarding into a small issue queue (stall channel)
//! - An execute unit that is busy every fourth cycle and stalls decode
//!
//! The simulation showcases:
//! - Declaring units against a shared registry in any order
//! - A single connection pass
//! - Backpressure through stall ports
//! - Statistics collection

use cycleport::{
    Cycle, NodeId, Payload, Port, PortRegistry, PortsConfigBuilder, ReadPort, ReadStallPort,
    WritePort, WriteStallPort,
};

// ============================================================================
// Pipeline Configuration
// ============================================================================

const FETCH_NODE: NodeId = 1;
const DECODE_NODE: NodeId = 2;
const EXECUTE_NODE: NodeId = 3;

const FETCH_TO_DECODE_LATENCY: u32 = 2;
const DECODE_TO_EXECUTE_LATENCY: u32 = 1;
const SIMULATION_CYCLES: Cycle = 40;

#[derive(Clone, Debug, Default)]
struct Instr {
    pc: u64,
    fetched_at: Cycle,
}

impl Payload for Instr {}

// ============================================================================
// Units
// ============================================================================

struct Fetch {
    out: WritePort<Instr>,
    next_pc: u64,
}

impl Fetch {
    fn new(registry: &PortRegistry) -> Self {
        let mut out = WritePort::new(registry);
        out.init_config("fetch_to_decode", 1, FETCH_TO_DECODE_LATENCY, FETCH_NODE)
            .unwrap();
        Self { out, next_pc: 0x1000 }
    }

    fn clock(&mut self, cycle: Cycle) {
        if self.out.writable(cycle) {
            let instr = Instr {
                pc: self.next_pc,
                fetched_at: cycle,
            };
            self.out.write(instr, cycle).unwrap();
            self.next_pc += 4;
        }
    }
}

struct Decode {
    input: ReadPort<Instr>,
    out: WriteStallPort<Instr>,
    pending: Option<Instr>,
    dropped: u64,
}

impl Decode {
    fn new(registry: &PortRegistry) -> Self {
        let mut input = ReadPort::new(registry);
        input.init("fetch_to_decode", DECODE_NODE, 0).unwrap();
        let mut out = WriteStallPort::new(registry);
        out.init("decode_to_execute", DECODE_NODE, 0).unwrap();
        Self {
            input,
            out,
            pending: None,
            dropped: 0,
        }
    }

    fn clock(&mut self, cycle: Cycle) {
        // Fetch cannot be held back: an instruction still blocked when the
        // next one arrives is dropped and counted.
        if let Some(instr) = self.input.read(cycle).unwrap() {
            if self.pending.replace(instr).is_some() {
                self.dropped += 1;
            }
        }
        if self.out.writable(cycle) {
            if let Some(instr) = self.pending.take() {
                self.out.write(instr, cycle).unwrap();
            }
        }
    }
}

struct Execute {
    input: ReadStallPort<Instr>,
    retired: Vec<(Cycle, Instr)>,
}

impl Execute {
    fn new(registry: &PortRegistry) -> Self {
        let mut input = ReadStallPort::new(registry);
        input.init("decode_to_execute", EXECUTE_NODE, 0).unwrap();
        input.config(1, DECODE_TO_EXECUTE_LATENCY).unwrap();
        Self {
            input,
            retired: Vec::new(),
        }
    }

    fn clock(&mut self, cycle: Cycle) {
        let busy = cycle % 4 == 3;
        if busy != self.input.is_stalled().unwrap() {
            self.input.stall(busy).unwrap();
        }
        if busy {
            return;
        }
        if let Some(instr) = self.input.read(cycle).unwrap() {
            self.retired.push((cycle, instr));
        }
    }
}

// ============================================================================
// Main simulation
// ============================================================================

fn main() {
    cycleport::init_logging("info");

    println!("==== Pipeline example ====");
    println!("fetch -> decode -> execute, execute busy every fourth cycle\n");

    let config = PortsConfigBuilder::new().lookahead_margin(2).build().unwrap();
    let registry = PortRegistry::with_config(config);

    // Declaration order does not matter.
    let mut execute = Execute::new(&registry);
    let mut fetch = Fetch::new(&registry);
    let mut decode = Decode::new(&registry);

    let report = registry.connect_all().unwrap();
    for w in &report.wirings {
        println!(
            "{:<20} {:>10} -> {:<10} bw {} lat {} rows {}",
            w.name, w.writer, w.reader, w.bandwidth, w.latency, w.rows
        );
    }
    println!();

    // Consumers run before producers within a cycle.
    for cycle in 0..SIMULATION_CYCLES {
        execute.clock(cycle);
        decode.clock(cycle);
        fetch.clock(cycle);
    }

    for (cycle, instr) in execute.retired.iter().take(8) {
        println!(
            "cycle {:>3}: retired pc {:#06x} (fetched in cycle {})",
            cycle, instr.pc, instr.fetched_at
        );
    }
    println!("...");
    println!(
        "retired {} instructions, decode dropped {}\n",
        execute.retired.len(),
        decode.dropped
    );

    print!("{}", registry.stats().summary());
}
