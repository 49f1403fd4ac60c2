//! # cycleport
//!
//! Typed, bandwidth- and latency-aware ports for cycle-accurate performance
//! simulation of hardware.
//!
//! Simulated units talk to each other only through named ports. A writer
//! endpoint and one or more reader endpoints that share a name and an
//! instance number form a channel. Each channel moves at most `bandwidth`
//! items per cycle, and an item written in cycle `c` becomes readable in
//! cycle `c + latency`.
//!
//! ## Design Principles
//!
//! - **Declare, then connect**: units create their ports against a shared
//!   [`PortRegistry`] in any order. A single [`PortRegistry::connect_all`]
//!   pass pairs endpoints, checks types and timing, and allocates storage.
//!   The pass is deterministic: it depends only on the declared endpoints.
//! - **The timing contract is enforced**: reading in the wrong cycle,
//!   writing backwards in time, exceeding bandwidth or overrunning an
//!   undrained row are reported as [`PortError`]s and logged with
//!   `tracing`. An empty read is `Ok(None)`, never an error.
//! - **Disciplines by type**: strict, skid, stall and phase ports share one
//!   ring storage and differ only in how they read.
//!
//! ## Quick Start
//!
//! ```rust
//! use cycleport::{Port, PortRegistry, ReadPort, WritePort};
//!
//! let registry = PortRegistry::new();
//!
//! let mut tx = WritePort::<u32>::new(&registry);
//! tx.init_config("fetch_to_decode", 1, 2, 0).unwrap();
//! let mut rx = ReadPort::<u32>::new(&registry);
//! rx.init("fetch_to_decode", 1, 0).unwrap();
//!
//! registry.connect_all().unwrap();
//!
//! tx.write(0xA, 10).unwrap();
//! assert_eq!(rx.read(11).unwrap(), None);
//! assert_eq!(rx.read(12).unwrap(), Some(0xA));
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use cycleport::{PortRegistry, PortsConfig};
//!
//! let config = PortsConfig::from_yaml_file("ports.yaml")?;
//! let registry = PortRegistry::with_config(config);
//! // ... declare ports, then connect
//! ```

pub mod types;
pub mod error;
pub mod payload;
pub mod event;
pub mod ring;
pub mod storage;
pub mod endpoint;
pub mod registry;
pub mod ports;
pub mod remote;
pub mod damqueue;
pub mod config;
pub mod stats;

// Re-export commonly used types
pub use types::{ClockEdge, Cycle, EdgeId, InstanceId, ItemId, NodeId, Phase};
pub use error::{ConnectError, PortError, PortResult, SetupError};
pub use payload::{Payload, TypeTag};
pub use event::{EdgeDesc, EventSink, EventTap, MoveRecord, RecordingSink};
pub use storage::{AccumulationPolicy, ReadMode, RingStorage};
pub use endpoint::{PortEndpoint, PortKey, PortKind};
pub use registry::{ConnectionReport, PortRegistry, Wiring};
pub use ports::{
    ConfigPort, PeekPort, Port, ReadPhasePort, ReadPort, ReadSkidPort, ReadStallPort,
    WritePhasePort, WritePort, WriteSkidPort, WriteStallPort,
};
pub use remote::{CancelToken, WaitOptions};
pub use damqueue::DamQueue;
pub use config::{ConfigError, PortsConfig, PortsConfigBuilder};
pub use stats::{ChannelStats, ChannelSummary, PortStats};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// overrides `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// cycleport::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
