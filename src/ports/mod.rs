//! Typed port handles.
//!
//! Each handle couples a [`PortEndpoint`] registered with a
//! [`PortRegistry`] to the storages the connection pass binds to it. The
//! handle's type fixes the access discipline:
//!
//! | Writer | Reader | Discipline |
//! |---|---|---|
//! | [`WritePort`] | [`ReadPort`] | strict: read exactly at the ready cycle |
//! | [`WriteSkidPort`] | [`ReadSkidPort`] | relaxed: reads may be skipped |
//! | [`WriteStallPort`] | [`ReadStallPort`] | relaxed, with reader backpressure |
//! | [`WritePhasePort`] | [`ReadPhasePort`] | strict, two phases per cycle |
//! | | [`PeekPort`] | non-destructive lookahead |
//!
//! [`ConfigPort`] carries only bandwidth and latency for a channel.
//!
//! Writers broadcast: with a fanout of `n`, every write lands in `n`
//! independent storages with the same cycle stamp.

mod config;
mod peek;
mod phase;
mod read;
mod skid;
mod stall;
mod write;

pub use config::ConfigPort;
pub use peek::PeekPort;
pub use phase::{ReadPhasePort, WritePhasePort};
pub use read::ReadPort;
pub use skid::{ReadSkidPort, WriteSkidPort};
pub use stall::{ReadStallPort, WriteStallPort};
pub use write::WritePort;

use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, OnceLock};

use crate::endpoint::{PortEndpoint, PortKey, PortKind};
use crate::error::{ConnectError, PortError, PortResult, SetupError};
use crate::event::{EdgeDesc, EventSink, EventTap};
use crate::payload::{Payload, TypeTag};
use crate::registry::{Binder, ChannelPlan, EntryId, PortRegistry, ReaderPlan, WiredChannel};
use crate::remote::{wait_until, WaitOptions};
use crate::storage::{shared, ReadMode, RingStorage, SharedStorage};
use crate::types::{Cycle, InstanceId, NodeId};

/// Endpoint state shared between a handle and the registry.
pub(crate) struct Binding<T> {
    endpoint: Mutex<PortEndpoint>,
    storages: OnceLock<Vec<SharedStorage<T>>>,
}

impl<T> Binding<T> {
    fn bind(&self, storages: Vec<SharedStorage<T>>) -> Result<(), ConnectError> {
        self.storages.set(storages).map_err(|_| {
            let endpoint = self.endpoint.lock();
            ConnectError::Storage {
                name: endpoint.label(),
                instance: endpoint.instance(),
                reason: "endpoint already holds storage".to_string(),
            }
        })
    }
}

impl<T: Payload> Binder for Binding<T> {
    fn endpoint(&self) -> &Mutex<PortEndpoint> {
        &self.endpoint
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn wire(
        &self,
        plan: &ChannelPlan,
        readers: &[ReaderPlan<'_>],
        sink: Option<&Arc<dyn EventSink>>,
    ) -> Result<Vec<WiredChannel>, ConnectError> {
        let mut storages = Vec::with_capacity(readers.len());
        let mut wired = Vec::with_capacity(readers.len());

        for reader in readers {
            let target = reader
                .binder
                .as_any()
                .downcast_ref::<Binding<T>>()
                .ok_or_else(|| ConnectError::TypeMismatch {
                    name: plan.name.clone(),
                    instance: plan.instance,
                    writer_type: std::any::type_name::<T>(),
                    reader_type: reader.type_name,
                })?;

            let mut storage = RingStorage::<T>::with_margin(plan.name.clone(), plan.margin);
            storage
                .create_storage(plan.latency, plan.bandwidth)
                .map_err(|e| ConnectError::Storage {
                    name: plan.name.clone(),
                    instance: plan.instance,
                    reason: e.to_string(),
                })?;
            storage.set_policy(reader.policy);

            let edge = sink.map(|sink| {
                let tap = EventTap::connect(
                    sink.clone(),
                    &EdgeDesc {
                        src_node: plan.writer_node,
                        dst_node: reader.node,
                        bandwidth: plan.bandwidth,
                        latency: plan.latency,
                        name: plan.name.clone(),
                    },
                );
                let edge = tap.edge();
                storage.set_tap(tap);
                edge
            });

            let storage = shared(storage);
            target.bind(vec![storage.clone()])?;
            wired.push(WiredChannel {
                probe: storage.clone(),
                edge,
            });
            storages.push(storage);
        }

        self.bind(storages)?;
        Ok(wired)
    }

    fn share_with(&self, peek: &dyn Binder) -> Result<(), ConnectError> {
        let endpoint = self.endpoint.lock().clone();
        let target = peek
            .as_any()
            .downcast_ref::<Binding<T>>()
            .ok_or_else(|| ConnectError::TypeMismatch {
                name: endpoint.label(),
                instance: endpoint.instance(),
                writer_type: std::any::type_name::<T>(),
                reader_type: peek.endpoint().lock().type_tag().name(),
            })?;

        let storage = self
            .storages
            .get()
            .and_then(|storages| storages.first())
            .cloned()
            .ok_or_else(|| ConnectError::Storage {
                name: endpoint.label(),
                instance: endpoint.instance(),
                reason: "reader has no storage to share".to_string(),
            })?;
        target.bind(vec![storage])
    }
}

/// The registered part of every port handle.
pub(crate) struct PortCore<T: Payload> {
    binding: Arc<Binding<T>>,
    registry: PortRegistry,
    entry: Option<EntryId>,
}

impl<T: Payload> PortCore<T> {
    pub(crate) fn new(registry: &PortRegistry, kind: PortKind) -> Self {
        Self::with_tag(registry, kind, TypeTag::of::<T>())
    }

    pub(crate) fn with_tag(registry: &PortRegistry, kind: PortKind, tag: TypeTag) -> Self {
        let binding = Arc::new(Binding {
            endpoint: Mutex::new(PortEndpoint::new(kind, tag)),
            storages: OnceLock::new(),
        });
        let entry = registry.register(binding.clone());
        Self {
            binding,
            registry: registry.clone(),
            entry,
        }
    }

    pub(crate) fn endpoint(&self) -> &Mutex<PortEndpoint> {
        &self.binding.endpoint
    }

    pub(crate) fn label(&self) -> String {
        self.binding.endpoint.lock().label()
    }

    pub(crate) fn storages(&self) -> PortResult<&[SharedStorage<T>]> {
        match self.binding.storages.get() {
            Some(storages) => Ok(storages),
            None => Err(PortError::NotConnected { port: self.label() }),
        }
    }

    pub(crate) fn storage(&self) -> PortResult<&SharedStorage<T>> {
        self.storages()?
            .first()
            .ok_or_else(|| PortError::NotConnected { port: self.label() })
    }

    /// Writes `item` into every fanout storage with the same stamp.
    ///
    /// Either every storage takes the item or none does: all of them are
    /// locked and checked before the first one is written.
    pub(crate) fn broadcast(&self, item: T, cycle: Cycle) -> PortResult<()> {
        let storages = self.storages()?;
        if let [only] = storages {
            return only.lock().write(item, cycle);
        }

        let mut guards: Vec<_> = storages.iter().map(|s| s.lock()).collect();
        for guard in &guards {
            guard.check_write(cycle)?;
        }
        if let Some((last, rest)) = guards.split_last_mut() {
            for guard in rest {
                guard.write(item.clone(), cycle)?;
            }
            last.write(item, cycle)?;
        }
        Ok(())
    }

    /// True if a write in `cycle` succeeds on every fanout storage.
    pub(crate) fn writable(&self, cycle: Cycle) -> bool {
        self.storages()
            .map(|storages| storages.iter().all(|s| s.lock().writable(cycle)))
            .unwrap_or(false)
    }

    pub(crate) fn broadcast_remote(
        &self,
        item: T,
        cycle: Cycle,
        options: &WaitOptions,
    ) -> PortResult<()> {
        let storages = self.storages()?;
        wait_until(&self.label(), cycle, options, || {
            storages.iter().all(|s| s.lock().writable(cycle))
        })?;
        self.broadcast(item, cycle)
    }

    pub(crate) fn read(&self, cycle: Cycle, mode: ReadMode) -> PortResult<Option<T>> {
        self.storage()?.lock().read(cycle, mode)
    }

    pub(crate) fn look(&self, cycle: Cycle, mode: ReadMode) -> PortResult<Option<T>> {
        self.storage()?.lock().look(cycle, mode)
    }

    pub(crate) fn something_to_read(&self, cycle: Cycle) -> PortResult<bool> {
        Ok(self.storage()?.lock().something_to_read(cycle))
    }

    pub(crate) fn read_remote(
        &self,
        cycle: Cycle,
        mode: ReadMode,
        options: &WaitOptions,
    ) -> PortResult<Option<T>> {
        let storage = self.storage()?;
        wait_until(&self.label(), cycle, options, || {
            storage.lock().something_to_read(cycle)
        })?;
        storage.lock().read(cycle, mode)
    }

    /// Stamp of the newest row, read from the first storage.
    pub(crate) fn latest_write(&self) -> PortResult<Option<Cycle>> {
        Ok(self.storage()?.lock().latest_write())
    }

    pub(crate) fn clear(&self) -> PortResult<()> {
        for storage in self.storages()? {
            storage.lock().clear();
        }
        Ok(())
    }
}

impl<T: Payload> Drop for PortCore<T> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.registry.deregister(entry);
        }
    }
}

/// Identity and configuration shared by every port handle.
///
/// Setters follow the endpoint's set-once rules and fail with a
/// [`SetupError`] the caller may recover from.
pub trait Port {
    /// The endpoint descriptor behind this handle.
    fn endpoint(&self) -> &Mutex<PortEndpoint>;

    /// Names the endpoint without a scope.
    fn init(&mut self, name: &str, node: NodeId, instance: InstanceId) -> Result<(), SetupError> {
        self.endpoint().lock().init(name, None, node, instance)
    }

    /// Names the endpoint within `scope`.
    fn init_scoped(
        &mut self,
        name: &str,
        scope: &str,
        node: NodeId,
        instance: InstanceId,
    ) -> Result<(), SetupError> {
        self.endpoint().lock().init(name, Some(scope), node, instance)
    }

    fn set_bandwidth(&mut self, bandwidth: u32) -> Result<(), SetupError> {
        self.endpoint().lock().set_bandwidth(bandwidth)
    }

    fn set_latency(&mut self, latency: u32) -> Result<(), SetupError> {
        self.endpoint().lock().set_latency(latency)
    }

    /// Sets bandwidth then latency.
    fn config(&mut self, bandwidth: u32, latency: u32) -> Result<(), SetupError> {
        self.set_bandwidth(bandwidth)?;
        self.set_latency(latency)
    }

    /// Names the endpoint (instance 0), then sets bandwidth and latency.
    fn init_config(
        &mut self,
        name: &str,
        bandwidth: u32,
        latency: u32,
        node: NodeId,
    ) -> Result<(), SetupError> {
        self.init(name, node, 0)?;
        self.config(bandwidth, latency)
    }

    fn kind(&self) -> PortKind {
        self.endpoint().lock().kind()
    }

    fn name(&self) -> Option<String> {
        self.endpoint().lock().name().map(str::to_string)
    }

    fn instance(&self) -> InstanceId {
        self.endpoint().lock().instance()
    }

    fn key(&self) -> Option<PortKey> {
        self.endpoint().lock().key()
    }

    fn bandwidth(&self) -> Option<u32> {
        self.endpoint().lock().bandwidth()
    }

    fn latency(&self) -> Option<u32> {
        self.endpoint().lock().latency()
    }

    fn is_connected(&self) -> bool {
        self.endpoint().lock().is_connected()
    }
}

macro_rules! impl_port {
    ($($port:ident),* $(,)?) => {
        $(
            impl<T: $crate::payload::Payload> $crate::ports::Port for $port<T> {
                fn endpoint(&self) -> &parking_lot::Mutex<$crate::endpoint::PortEndpoint> {
                    self.core.endpoint()
                }
            }

            impl<T: $crate::payload::Payload> std::fmt::Debug for $port<T> {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    let endpoint = self.core.endpoint().lock();
                    f.debug_struct(stringify!($port))
                        .field("name", &endpoint.name())
                        .field("instance", &endpoint.instance())
                        .field("connected", &endpoint.is_connected())
                        .finish()
                }
            }
        )*
    };
}

pub(crate) use impl_port;
