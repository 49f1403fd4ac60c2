//! Error types for endpoint configuration, connection and runtime access.
//!
//! Errors fall into three families that match the points in a simulation's
//! life where they can occur:
//!
//! - [`SetupError`]: an endpoint was configured incorrectly during
//!   construction. The caller may retry with corrected arguments.
//! - [`ConnectError`]: the connection pass could not wire the registered
//!   endpoints together. Setup must abort.
//! - [`PortError`]: a simulated unit broke a channel's usage contract at
//!   run time (or a bounded remote wait expired). Except for the wait
//!   outcomes, these identify a modeling bug and the run must stop.
//!
//! Soft misses (no data yet, not at the ready cycle) are not errors; read
//! operations report them as `Ok(None)`.

use thiserror::Error;

use crate::endpoint::PortKind;
use crate::types::{Cycle, InstanceId};

/// Errors raised while configuring an endpoint before connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("port name must not be empty")]
    EmptyName,

    #[error("port {current} has already been initialized (attempted rename to {requested})")]
    AlreadyInitialized { current: String, requested: String },

    #[error("port {port} is already connected and can no longer be configured")]
    AlreadyConnected { port: String },

    #[error("bandwidth of port {port} was already set to {current}")]
    BandwidthAlreadySet { port: String, current: u32 },

    #[error("latency of port {port} was already set to {current}")]
    LatencyAlreadySet { port: String, current: u32 },

    #[error("bandwidth of port {port} must be greater than zero")]
    ZeroBandwidth { port: String },

    #[error("port {port} was declared after the connection pass closed the registry")]
    RegistryClosed { port: String },

    #[error("fanout of port {port} must be greater than zero")]
    ZeroFanout { port: String },

    #[error("{kind} port {port} cannot drive a fanout of {fanout}")]
    FanoutUnsupported {
        port: String,
        kind: PortKind,
        fanout: usize,
    },
}

/// Errors raised by the connection pass. All of them abort setup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("the connection pass already ran on this registry")]
    AlreadyConnected,

    #[error("a {kind} endpoint was registered but never given a name")]
    Uninitialized { kind: PortKind },

    #[error("write port {name}[{instance}] has no matching read port")]
    UnmatchedProducer { name: String, instance: InstanceId },

    #[error("{kind} port {name}[{instance}] has no matching write port")]
    UnmatchedConsumer {
        name: String,
        instance: InstanceId,
        kind: PortKind,
    },

    #[error("write port {name}[{instance}] is declared more than once")]
    DuplicateProducer { name: String, instance: InstanceId },

    #[error("more than one peek port is attached to {name}[{instance}]")]
    DuplicatePeek { name: String, instance: InstanceId },

    #[error(
        "type mismatch on {name}[{instance}]: writer carries {writer_type}, reader carries {reader_type}"
    )]
    TypeMismatch {
        name: String,
        instance: InstanceId,
        writer_type: &'static str,
        reader_type: &'static str,
    },

    #[error("{writer} port cannot drive {reader} port {name}[{instance}]")]
    IncompatibleKinds {
        name: String,
        instance: InstanceId,
        writer: PortKind,
        reader: PortKind,
    },

    #[error("write port {name}[{instance}] declares fanout {expected} but {found} read ports match")]
    FanoutMismatch {
        name: String,
        instance: InstanceId,
        expected: usize,
        found: usize,
    },

    #[error("bandwidth mismatch on {name}[{instance}]: {first} vs {second}")]
    BandwidthMismatch {
        name: String,
        instance: InstanceId,
        first: u32,
        second: u32,
    },

    #[error("latency mismatch on {name}[{instance}]: {first} vs {second}")]
    LatencyMismatch {
        name: String,
        instance: InstanceId,
        first: u32,
        second: u32,
    },

    #[error("bandwidth of {name}[{instance}] is not set on either endpoint")]
    MissingBandwidth { name: String, instance: InstanceId },

    #[error("latency of {name}[{instance}] is not set on either endpoint")]
    MissingLatency { name: String, instance: InstanceId },

    #[error("storage for {name}[{instance}] could not be attached: {reason}")]
    Storage {
        name: String,
        instance: InstanceId,
        reason: String,
    },
}

/// Errors raised while a simulation is running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("port {port} is not connected")]
    NotConnected { port: String },

    #[error("storage of port {port} has not been created")]
    NoStorage { port: String },

    #[error("storage of port {port} was already created")]
    StorageExists { port: String },

    #[error("storage of port {port} requires a bandwidth greater than zero")]
    ZeroBandwidth { port: String },

    #[error("port {port} exceeded bandwidth ({bandwidth}) in cycle {cycle}")]
    BandwidthExceeded {
        port: String,
        cycle: Cycle,
        bandwidth: usize,
    },

    #[error("port {port} buffers are fifo and time must always advance (wrote cycle {cycle} after {last})")]
    NonMonotonicWrite { port: String, cycle: Cycle, last: Cycle },

    #[error("port {port} trying to write cycle {cycle} into buffer row {row} that still holds data")]
    Overrun { port: String, cycle: Cycle, row: usize },

    #[error("trying to write port {port} in cycle {cycle} while it is stalled")]
    Stalled { port: String, cycle: Cycle },

    #[error("reading data from port {port} in the wrong cycle (got {cycle} instead of required {expected})")]
    WrongCycle {
        port: String,
        cycle: Cycle,
        expected: Cycle,
    },

    #[error("port {port} accumulated {writes} writes without a read (last write in cycle {last_written}, read in cycle {cycle})")]
    Overaccumulated {
        port: String,
        cycle: Cycle,
        last_written: Cycle,
        writes: u64,
    },

    #[error("timed out waiting on port {port} in cycle {cycle}")]
    WaitTimedOut { port: String, cycle: Cycle },

    #[error("wait on port {port} in cycle {cycle} was cancelled")]
    WaitCancelled { port: String, cycle: Cycle },
}

impl PortError {
    /// Returns true if the error reports a usage-contract violation that
    /// must stop the simulation.
    ///
    /// Remote wait outcomes are the only non-fatal runtime errors: the
    /// caller chose the bound and may retry.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PortError::WaitTimedOut { .. } | PortError::WaitCancelled { .. }
        )
    }

    /// Returns the name of the port the error refers to.
    pub fn port(&self) -> &str {
        match self {
            PortError::NotConnected { port }
            | PortError::NoStorage { port }
            | PortError::StorageExists { port }
            | PortError::ZeroBandwidth { port }
            | PortError::BandwidthExceeded { port, .. }
            | PortError::NonMonotonicWrite { port, .. }
            | PortError::Overrun { port, .. }
            | PortError::Stalled { port, .. }
            | PortError::WrongCycle { port, .. }
            | PortError::Overaccumulated { port, .. }
            | PortError::WaitTimedOut { port, .. }
            | PortError::WaitCancelled { port, .. } => port,
        }
    }
}

/// Result type for runtime port operations.
pub type PortResult<T> = Result<T, PortError>;
