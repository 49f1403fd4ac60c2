use parking_lot::Mutex;
use std::fmt;

use super::{Port, PortCore};
use crate::endpoint::{PortEndpoint, PortKind};
use crate::payload::TypeTag;
use crate::registry::PortRegistry;

/// Carries bandwidth and latency for a channel without reading or writing.
///
/// Lets a unit that owns the timing of a link declare it while producer
/// and consumer stay unconfigured. The connection pass requires every
/// declared value on a channel to agree. A config port whose name matches
/// no channel is reported in
/// [`ConnectionReport::unused_config`](crate::registry::ConnectionReport).
///
/// Latency is always given in cycles, also for phase channels.
pub struct ConfigPort {
    core: PortCore<()>,
}

impl ConfigPort {
    pub fn new(registry: &PortRegistry) -> Self {
        Self {
            core: PortCore::with_tag(registry, PortKind::Config, TypeTag::of::<ConfigPort>()),
        }
    }
}

impl Port for ConfigPort {
    fn endpoint(&self) -> &Mutex<PortEndpoint> {
        self.core.endpoint()
    }
}

impl fmt::Debug for ConfigPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoint = self.core.endpoint().lock();
        f.debug_struct("ConfigPort")
            .field("name", &endpoint.name())
            .field("bandwidth", &endpoint.bandwidth())
            .field("latency", &endpoint.latency())
            .finish()
    }
}
