use super::{impl_port, PortCore};
use crate::endpoint::PortKind;
use crate::error::PortResult;
use crate::payload::Payload;
use crate::registry::PortRegistry;
use crate::types::Cycle;

/// Non-destructive observer of a channel.
///
/// A peek port shares the storage of the channel's first reader. It walks
/// the buffered items with its own cursor and never takes anything, so the
/// reader sees exactly what it would have seen without the observer. At
/// most one peek port may join a channel.
pub struct PeekPort<T: Payload> {
    core: PortCore<T>,
}

impl_port!(PeekPort);

impl<T: Payload> PeekPort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::Peek),
        }
    }

    /// Returns a copy of the next buffered item that is due by `cycle`, and
    /// moves the peek cursor past it.
    pub fn peek_next(&self, cycle: Cycle) -> PortResult<Option<T>> {
        Ok(self.core.storage()?.lock().peek_next(cycle))
    }

    /// Moves the peek cursor back to the reader's position.
    pub fn peek_reset(&self) -> PortResult<()> {
        self.core.storage()?.lock().peek_reset();
        Ok(())
    }

    pub fn something_to_read(&self, cycle: Cycle) -> PortResult<bool> {
        self.core.something_to_read(cycle)
    }
}
