use super::{impl_port, PortCore};
use crate::endpoint::PortKind;
use crate::error::{PortResult, SetupError};
use crate::payload::Payload;
use crate::registry::PortRegistry;
use crate::storage::ReadMode;
use crate::types::Cycle;

/// Writing end of a skid channel.
pub struct WriteSkidPort<T: Payload> {
    core: PortCore<T>,
}

/// Reading end of a skid channel.
///
/// The consumer may leave due items in the channel and collect them in a
/// later cycle; [`something_to_read`](Self::something_to_read) supports
/// draining opportunistically.
pub struct ReadSkidPort<T: Payload> {
    core: PortCore<T>,
}

impl_port!(WriteSkidPort, ReadSkidPort);

impl<T: Payload> WriteSkidPort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::WriteSkid),
        }
    }

    pub fn set_fanout(&mut self, fanout: usize) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_fanout(fanout)
    }

    pub fn write(&self, item: T, cycle: Cycle) -> PortResult<()> {
        self.core.broadcast(item, cycle)
    }

    pub fn writable(&self, cycle: Cycle) -> bool {
        self.core.writable(cycle)
    }

    pub fn latest_write(&self) -> PortResult<Option<Cycle>> {
        self.core.latest_write()
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}

impl<T: Payload> ReadSkidPort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::ReadSkid),
        }
    }

    /// Takes the oldest item that is due by `cycle`.
    pub fn read(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.core.read(cycle, ReadMode::Relaxed)
    }

    pub fn look(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.core.look(cycle, ReadMode::Relaxed)
    }

    /// True if some item is due by `cycle`.
    pub fn something_to_read(&self, cycle: Cycle) -> PortResult<bool> {
        self.core.something_to_read(cycle)
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}
