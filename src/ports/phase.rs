//! Half-cycle ports.
//!
//! Phase ports number time in phases, two per cycle, so one logical channel
//! can carry a value on each clock edge. A plain cycle `c` maps to phase
//! `2c`, `(c, edge)` to `2c + edge`, and a [`Phase`] is used as is.
//! Latencies given in cycles are doubled; `set_latency_phases` takes a
//! latency already counted in phases.

use parking_lot::Mutex;
use std::fmt;

use super::{Port, PortCore};
use crate::endpoint::{PortEndpoint, PortKind};
use crate::error::{PortResult, SetupError};
use crate::payload::Payload;
use crate::registry::PortRegistry;
use crate::storage::ReadMode;
use crate::types::{ClockEdge, Cycle, Phase};

/// Writing end of a phase channel.
pub struct WritePhasePort<T: Payload> {
    core: PortCore<T>,
}

/// Reading end of a phase channel. Reads are strict, per phase.
pub struct ReadPhasePort<T: Payload> {
    core: PortCore<T>,
}

fn doubled(latency: u32) -> u32 {
    latency.saturating_mul(2)
}

impl<T: Payload> WritePhasePort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::WritePhase),
        }
    }

    pub fn set_fanout(&mut self, fanout: usize) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_fanout(fanout)
    }

    /// Sets the latency in phases.
    pub fn set_latency_phases(&mut self, latency: u32) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_latency(latency)
    }

    /// Writes on the high phase of `cycle`.
    pub fn write(&self, item: T, cycle: Cycle) -> PortResult<()> {
        self.core.broadcast(item, Phase::new(cycle, ClockEdge::High).number())
    }

    pub fn write_phase(&self, item: T, phase: Phase) -> PortResult<()> {
        self.core.broadcast(item, phase.number())
    }

    pub fn write_edge(&self, item: T, cycle: Cycle, edge: ClockEdge) -> PortResult<()> {
        self.core.broadcast(item, Phase::new(cycle, edge).number())
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}

impl<T: Payload> ReadPhasePort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::ReadPhase),
        }
    }

    /// Sets the latency in phases.
    pub fn set_latency_phases(&mut self, latency: u32) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_latency(latency)
    }

    /// Reads on the high phase of `cycle`.
    pub fn read(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.read_phase(Phase::new(cycle, ClockEdge::High))
    }

    pub fn read_phase(&self, phase: Phase) -> PortResult<Option<T>> {
        self.core.read(phase.number(), ReadMode::Strict)
    }

    pub fn read_edge(&self, cycle: Cycle, edge: ClockEdge) -> PortResult<Option<T>> {
        self.read_phase(Phase::new(cycle, edge))
    }

    pub fn look_phase(&self, phase: Phase) -> PortResult<Option<T>> {
        self.core.look(phase.number(), ReadMode::Strict)
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}

impl<T: Payload> Port for WritePhasePort<T> {
    fn endpoint(&self) -> &Mutex<PortEndpoint> {
        self.core.endpoint()
    }

    /// Sets the latency in cycles; stored as twice as many phases.
    fn set_latency(&mut self, latency: u32) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_latency(doubled(latency))
    }
}

impl<T: Payload> Port for ReadPhasePort<T> {
    fn endpoint(&self) -> &Mutex<PortEndpoint> {
        self.core.endpoint()
    }

    /// Sets the latency in cycles; stored as twice as many phases.
    fn set_latency(&mut self, latency: u32) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_latency(doubled(latency))
    }
}

impl<T: Payload> fmt::Debug for WritePhasePort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritePhasePort")
            .field("name", &self.name())
            .field("latency_phases", &self.latency())
            .finish()
    }
}

impl<T: Payload> fmt::Debug for ReadPhasePort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadPhasePort")
            .field("name", &self.name())
            .field("latency_phases", &self.latency())
            .finish()
    }
}
