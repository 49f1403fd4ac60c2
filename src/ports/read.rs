use super::{impl_port, PortCore};
use crate::endpoint::PortKind;
use crate::error::PortResult;
use crate::payload::Payload;
use crate::registry::PortRegistry;
use crate::remote::WaitOptions;
use crate::storage::ReadMode;
use crate::types::Cycle;

/// Reading end of a strict channel.
///
/// Every item must be read exactly in its ready cycle (`written + latency`);
/// reading it later is a [`PortError::WrongCycle`](crate::error::PortError).
pub struct ReadPort<T: Payload> {
    core: PortCore<T>,
}

impl_port!(ReadPort);

impl<T: Payload> ReadPort<T> {
    /// Creates the port and registers it with `registry`.
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::Read),
        }
    }

    /// Takes the next item due in `cycle`, if any.
    pub fn read(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.core.read(cycle, ReadMode::Strict)
    }

    /// Returns the next item due in `cycle` without taking it.
    pub fn look(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.core.look(cycle, ReadMode::Strict)
    }

    /// Waits for the producer thread to make an item readable in `cycle`,
    /// then reads it.
    pub fn read_remote(&self, cycle: Cycle, options: &WaitOptions) -> PortResult<Option<T>> {
        self.core.read_remote(cycle, ReadMode::Strict, options)
    }

    /// True while the channel checks writes against undrained rows.
    pub fn is_active(&self) -> PortResult<bool> {
        Ok(self.core.storage()?.lock().is_active())
    }

    /// Stops overrun detection, for a reader that has been switched off.
    ///
    /// The next successful read re-enables it.
    pub fn deactivate(&self) -> PortResult<()> {
        self.core.storage()?.lock().set_active(false);
        Ok(())
    }

    /// Cycle of the last successful read.
    pub fn last_accessed(&self) -> PortResult<Option<Cycle>> {
        Ok(self.core.storage()?.lock().last_accessed())
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}
