//! Core type definitions for the port subsystem.
//!
//! This module defines the fundamental types shared by storages, endpoints
//! and the connection registry.

use serde::{Deserialize, Serialize};

/// Simulated time in clock cycles.
///
/// All visibility and ordering guarantees of a channel are expressed
/// relative to cycle numbers. Phase-clocked ports use the same type to
/// carry phase numbers (two phases per cycle).
pub type Cycle = u64;

/// Identifier of the simulated unit that owns an endpoint.
///
/// Used for diagnostics and for describing event edges to an external
/// event sink.
pub type NodeId = u64;

/// Instance number distinguishing endpoints that share a name.
pub type InstanceId = u32;

/// Identifier of a channel edge, handed out by an event sink at connection time.
pub type EdgeId = u16;

/// Identifier of an observable payload item.
pub type ItemId = u64;

/// A clock edge within a cycle, used to address one of its two phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum ClockEdge {
    /// First phase of the cycle.
    #[default]
    High = 0,
    /// Second phase of the cycle.
    Low = 1,
}

impl ClockEdge {
    /// Returns the phase offset (0 or 1) this edge adds within a cycle.
    #[inline]
    pub fn offset(self) -> Cycle {
        self as Cycle
    }
}

/// A half-cycle position on the simulated timeline.
///
/// Phase `2 * c` is the high phase of cycle `c` and `2 * c + 1` the low phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Phase(Cycle);

impl Phase {
    /// Creates the phase of `cycle` selected by `edge`.
    ///
    /// # Example
    ///
    /// ```
    /// use cycleport::types::{ClockEdge, Phase};
    ///
    /// assert_eq!(Phase::new(10, ClockEdge::High).number(), 20);
    /// assert_eq!(Phase::new(10, ClockEdge::Low).number(), 21);
    /// ```
    pub fn new(cycle: Cycle, edge: ClockEdge) -> Self {
        Self(cycle * 2 + edge.offset())
    }

    /// Creates a phase from its raw phase number.
    pub fn from_number(number: Cycle) -> Self {
        Self(number)
    }

    /// Returns the raw phase number.
    #[inline]
    pub fn number(self) -> Cycle {
        self.0
    }

    /// Returns the cycle this phase belongs to.
    #[inline]
    pub fn cycle(self) -> Cycle {
        self.0 / 2
    }

    /// Returns which edge of its cycle this phase is.
    #[inline]
    pub fn edge(self) -> ClockEdge {
        if self.0 % 2 == 0 {
            ClockEdge::High
        } else {
            ClockEdge::Low
        }
    }

    /// Returns the following phase.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
