use super::{impl_port, PortCore};
use crate::endpoint::PortKind;
use crate::error::{PortResult, SetupError};
use crate::payload::Payload;
use crate::registry::PortRegistry;
use crate::storage::ReadMode;
use crate::types::Cycle;

/// Writing end of a stall channel.
///
/// Writes are rejected with [`PortError::Stalled`](crate::error::PortError)
/// while the reader holds the channel stalled.
pub struct WriteStallPort<T: Payload> {
    core: PortCore<T>,
}

/// Reading end of a stall channel.
///
/// Reads are relaxed like a skid reader's. In addition the consumer can
/// apply backpressure with [`stall`](Self::stall).
pub struct ReadStallPort<T: Payload> {
    core: PortCore<T>,
}

impl_port!(WriteStallPort, ReadStallPort);

impl<T: Payload> WriteStallPort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::WriteStall),
        }
    }

    /// Only a fanout of 1 is accepted; any other value fails with
    /// [`SetupError::FanoutUnsupported`].
    pub fn set_fanout(&mut self, fanout: usize) -> Result<(), SetupError> {
        self.core.endpoint().lock().set_fanout(fanout)
    }

    pub fn write(&self, item: T, cycle: Cycle) -> PortResult<()> {
        self.core.broadcast(item, cycle)
    }

    pub fn writable(&self, cycle: Cycle) -> bool {
        self.core.writable(cycle)
    }

    /// True if any reader currently stalls the channel.
    pub fn is_stalled(&self) -> PortResult<bool> {
        Ok(self.core.storages()?.iter().any(|s| s.lock().is_stalled()))
    }

    pub fn latest_write(&self) -> PortResult<Option<Cycle>> {
        self.core.latest_write()
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}

impl<T: Payload> ReadStallPort<T> {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::new(registry, PortKind::ReadStall),
        }
    }

    pub fn read(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.core.read(cycle, ReadMode::Relaxed)
    }

    pub fn look(&self, cycle: Cycle) -> PortResult<Option<T>> {
        self.core.look(cycle, ReadMode::Relaxed)
    }

    pub fn something_to_read(&self, cycle: Cycle) -> PortResult<bool> {
        self.core.something_to_read(cycle)
    }

    /// Applies or releases backpressure.
    ///
    /// Stalling rejects writes and postpones every buffered item by one
    /// cycle; each call with `true` adds another cycle.
    pub fn stall(&self, stalled: bool) -> PortResult<()> {
        self.core.storage()?.lock().stall(stalled);
        Ok(())
    }

    /// Sets the stalled flag without delaying buffered items.
    pub fn set_stalled(&self, stalled: bool) -> PortResult<()> {
        self.core.storage()?.lock().set_stalled(stalled);
        Ok(())
    }

    pub fn is_stalled(&self) -> PortResult<bool> {
        Ok(self.core.storage()?.lock().is_stalled())
    }

    pub fn clear(&self) -> PortResult<()> {
        self.core.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use crate::ports::Port;

    #[test]
    fn test_stall_cycle() {
        let registry = PortRegistry::new();
        let mut tx = WriteStallPort::<u32>::new(&registry);
        tx.init_config("st", 1, 1, 0).unwrap();
        let mut rx = ReadStallPort::<u32>::new(&registry);
        rx.init("st", 0, 0).unwrap();
        registry.connect_all().unwrap();

        tx.write(1, 3).unwrap();
        rx.stall(true).unwrap();
        assert!(tx.is_stalled().unwrap());
        assert!(!tx.writable(4));
        assert!(matches!(tx.write(2, 4), Err(PortError::Stalled { cycle: 4, .. })));

        // The buffered item moved from cycle 4 to cycle 5.
        assert_eq!(rx.read(4).unwrap(), None);

        rx.stall(false).unwrap();
        assert!(!rx.is_stalled().unwrap());
        tx.write(2, 5).unwrap();
        assert_eq!(rx.read(5).unwrap(), Some(1));
        assert_eq!(rx.read(6).unwrap(), Some(2));
    }

    #[test]
    fn test_set_stalled_without_delay() {
        let registry = PortRegistry::new();
        let mut tx = WriteStallPort::<u32>::new(&registry);
        tx.init_config("hold", 1, 0, 0).unwrap();
        let mut rx = ReadStallPort::<u32>::new(&registry);
        rx.init("hold", 0, 0).unwrap();
        registry.connect_all().unwrap();

        tx.write(9, 2).unwrap();
        rx.set_stalled(true).unwrap();
        assert_eq!(rx.look(2).unwrap(), Some(9));
        rx.set_stalled(false).unwrap();
        assert_eq!(rx.read(2).unwrap(), Some(9));
    }
}
