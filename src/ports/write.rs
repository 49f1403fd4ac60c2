use super::{impl_port, PortCore};
use crate::endpoint::PortKind;
use crate::error::{PortResult, SetupError};
use crate::payload::Payload;
use crate::registry::PortRegistry;
use crate::remote::WaitOptions;
use crate::types::Cycle;

/// Writing end of a strict channel.
///
/// Pairs with [`ReadPort`](super::ReadPort), and with the skid and stall
/// readers when the consumer needs a relaxed discipline.
pub struct WritePort<T: Payload> {
    core: PortCore<T>,
}

impl_port!(WritePort);

impl<T: Payload> WritePort<T> {
    /// Creates the port and registers it with `registry`.
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::Write),
        }
    }

    /// Broadcasts to `fanout` readers instead of one.
    pub fn set_fanout(&mut self, fanout: usize) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_fanout(fanout)
    }

    pub fn fanout(&self) -> usize {
        self.core.endpoint().lock().fanout()
    }

    /// Writes `item` in `cycle` to every connected reader.
    pub fn write(&self, item: T, cycle: Cycle) -> PortResult<()> {
        self.core.broadcast(item, cycle)
    }

    /// Waits until every reader has room for a write in `cycle`, then
    /// writes.
    ///
    /// For producers running on their own thread; the wait is bounded by
    /// `options`.
    pub fn write_remote(&self, item: T, cycle: Cycle, options: &WaitOptions) -> PortResult<()> {
        self.core.broadcast_remote(item, cycle, options)
    }

    /// True if a write in `cycle` would be accepted.
    pub fn writable(&self, cycle: Cycle) -> bool {
        self.core.writable(cycle)
    }

    /// Cycle of the most recent write.
    pub fn latest_write(&self) -> PortResult<Option<Cycle>> {
        self.core.latest_write()
    }

    /// Drops everything buffered on every fanout channel.
    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}
