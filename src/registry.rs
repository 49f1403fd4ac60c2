//! Endpoint registry and the connection pass.
//!
//! Every port registers itself with a [`PortRegistry`] when it is created
//! and leaves it when dropped. Once all simulated units are built,
//! [`PortRegistry::connect_all`] pairs each writer with its readers, sizes
//! and allocates one storage per reader, and hands the storages to both
//! ends. The pass runs once; endpoints created afterwards are refused.
//!
//! # Example
//!
//! ```
//! use cycleport::ports::{Port, ReadPort, WritePort};
//! use cycleport::registry::PortRegistry;
//!
//! let registry = PortRegistry::new();
//!
//! let mut tx = WritePort::<u32>::new(&registry);
//! tx.init_config("fetch_to_decode", 1, 2, 1).unwrap();
//! let mut rx = ReadPort::<u32>::new(&registry);
//! rx.init("fetch_to_decode", 2, 0).unwrap();
//!
//! let report = registry.connect_all().unwrap();
//! assert_eq!(report.channel_count(), 1);
//!
//! tx.write(7, 10).unwrap();
//! assert_eq!(rx.read(11).unwrap(), None);
//! assert_eq!(rx.read(12).unwrap(), Some(7));
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PortsConfig;
use crate::endpoint::{PortEndpoint, PortKey, PortKind};
use crate::error::ConnectError;
use crate::event::EventSink;
use crate::payload::Payload;
use crate::stats::{ChannelStats, ChannelSummary, PortStats};
use crate::storage::{AccumulationPolicy, RingStorage};
use crate::types::{EdgeId, InstanceId, NodeId};

pub(crate) type EntryId = u64;

/// Parameters shared by every storage of one channel.
pub(crate) struct ChannelPlan {
    pub name: String,
    pub instance: InstanceId,
    pub bandwidth: u32,
    pub latency: u32,
    pub margin: usize,
    pub writer_node: NodeId,
}

/// One reader a writer is wired to.
pub(crate) struct ReaderPlan<'a> {
    pub binder: &'a dyn Binder,
    pub node: NodeId,
    pub type_name: &'static str,
    pub policy: AccumulationPolicy,
}

/// A storage created by the connection pass.
pub(crate) struct WiredChannel {
    pub probe: Arc<dyn ChannelProbe>,
    pub edge: Option<EdgeId>,
}

/// Type-erased access to a registered endpoint and its storage slot.
pub(crate) trait Binder: Send + Sync {
    fn endpoint(&self) -> &Mutex<PortEndpoint>;

    fn as_any(&self) -> &dyn Any;

    /// Allocates one storage per reader and binds it to both ends.
    fn wire(
        &self,
        plan: &ChannelPlan,
        readers: &[ReaderPlan<'_>],
        sink: Option<&Arc<dyn EventSink>>,
    ) -> Result<Vec<WiredChannel>, ConnectError>;

    /// Lets a peek endpoint observe this reader's storage.
    fn share_with(&self, peek: &dyn Binder) -> Result<(), ConnectError>;
}

/// Type-erased view of a connected storage, for statistics and resets.
pub(crate) trait ChannelProbe: Send + Sync {
    fn stats(&self) -> ChannelStats;

    fn occupancy(&self) -> usize;

    fn clear(&self);
}

impl<T: Payload> ChannelProbe for Mutex<RingStorage<T>> {
    fn stats(&self) -> ChannelStats {
        self.lock().stats().clone()
    }

    fn occupancy(&self) -> usize {
        self.lock().occupancy()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// One writer-to-reader storage chosen by the connection pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wiring {
    /// Channel name
    pub name: String,
    /// Channel instance
    pub instance: InstanceId,
    /// Role of the writing endpoint
    pub writer: PortKind,
    /// Role of the reading endpoint
    pub reader: PortKind,
    /// Unit owning the writer
    pub writer_node: NodeId,
    /// Unit owning the reader
    pub reader_node: NodeId,
    /// Position among the writer's fanout storages
    pub fanout_index: usize,
    /// Items per cycle row
    pub bandwidth: u32,
    /// Cycles (or phases, for phase ports) between write and earliest read
    pub latency: u32,
    /// Rows allocated for the storage
    pub rows: usize,
    /// Whether a peek endpoint shares this storage
    pub peeked: bool,
    /// Event edge handed out by the sink, if events are enabled
    pub edge: Option<EdgeId>,
}

/// The outcome of a connection pass, in deterministic order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    /// One entry per allocated storage
    pub wirings: Vec<Wiring>,
    /// Config-only endpoints and entries that matched no channel
    pub unused_config: Vec<String>,
}

impl ConnectionReport {
    /// Number of allocated storages.
    pub fn channel_count(&self) -> usize {
        self.wirings.len()
    }

    /// Finds the storages of the channel `name`.
    pub fn find(&self, name: &str, instance: InstanceId) -> Vec<&Wiring> {
        self.wirings
            .iter()
            .filter(|w| w.name == name && w.instance == instance)
            .collect()
    }
}

struct Declared {
    binder: Arc<dyn Binder>,
    endpoint: PortEndpoint,
    key: PortKey,
}

struct Channel {
    wiring: Wiring,
    probe: Arc<dyn ChannelProbe>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<(EntryId, Arc<dyn Binder>)>,
    next_id: EntryId,
    closed: bool,
    config: PortsConfig,
    sink: Option<Arc<dyn EventSink>>,
    channels: Vec<Channel>,
    report: Option<ConnectionReport>,
}

/// Registry of all endpoints of one simulation.
///
/// Cloning the registry yields another handle to the same set of endpoints.
#[derive(Clone, Default)]
pub struct PortRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PortRegistry {
    /// Creates an empty registry with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry using `config`.
    pub fn with_config(config: PortsConfig) -> Self {
        let registry = Self::new();
        registry.inner.lock().config = config;
        registry
    }

    /// Installs the sink that receives item moves.
    ///
    /// Taps are only created when `ports.events_enabled` is set.
    pub fn with_sink(self, sink: Arc<dyn EventSink>) -> Self {
        self.set_sink(sink);
        self
    }

    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        self.inner.lock().sink = Some(sink);
    }

    /// Returns a copy of the active configuration.
    pub fn config(&self) -> PortsConfig {
        self.inner.lock().config.clone()
    }

    /// Adds an endpoint. Returns `None` once the connection pass has run;
    /// the endpoint is then marked so that its `init` fails.
    pub(crate) fn register(&self, binder: Arc<dyn Binder>) -> Option<EntryId> {
        let mut inner = self.inner.lock();
        if inner.closed {
            let mut endpoint = binder.endpoint().lock();
            endpoint.reject_registration();
            warn!(kind = %endpoint.kind(), "endpoint created after connection pass");
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, binder));
        Some(id)
    }

    pub(crate) fn deregister(&self, id: EntryId) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.entries.iter().position(|(entry, _)| *entry == id) {
            inner.entries.remove(pos);
        }
    }

    /// Number of live endpoints.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the connection pass has run.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().closed
    }

    /// Returns the report of a successful connection pass.
    pub fn report(&self) -> Option<ConnectionReport> {
        self.inner.lock().report.clone()
    }

    /// Pairs every writer with its readers and allocates their storages.
    ///
    /// Runs once. A failure leaves the registry closed: setup must abort.
    pub fn connect_all(&self) -> Result<ConnectionReport, ConnectError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ConnectError::AlreadyConnected);
        }
        inner.closed = true;

        let mut declared = Vec::with_capacity(inner.entries.len());
        for (_, binder) in &inner.entries {
            let endpoint = binder.endpoint().lock().clone();
            let key = endpoint.key().ok_or(ConnectError::Uninitialized {
                kind: endpoint.kind(),
            })?;
            declared.push(Declared {
                binder: binder.clone(),
                endpoint,
                key,
            });
        }
        // Stable: registration order breaks ties between equal keys.
        declared.sort_by(|a, b| a.key.cmp(&b.key));

        let mut groups: Vec<&[Declared]> = Vec::new();
        let mut rest = declared.as_slice();
        while let Some(first) = rest.first() {
            let len = rest
                .iter()
                .take_while(|d| d.key.same_channel(&first.key))
                .count();
            let (group, tail) = rest.split_at(len);
            groups.push(group);
            rest = tail;
        }

        let mut plans = Vec::new();
        let mut report = ConnectionReport::default();
        for group in &groups {
            match plan_group(group, &inner.config)? {
                Some(plan) => plans.push(plan),
                None => report.unused_config.push(group[0].key.name.clone()),
            }
        }
        for ch in &inner.config.channels {
            if !groups
                .iter()
                .any(|g| g[0].key.name == ch.name && g[0].key.instance == ch.instance)
            {
                report.unused_config.push(ch.name.clone());
            }
        }
        for name in &report.unused_config {
            warn!(channel = %name, "configured channel has no ports");
        }

        let sink = if inner.config.ports.events_enabled {
            inner.sink.clone()
        } else {
            None
        };

        let mut channels = Vec::new();
        for plan in &plans {
            let readers: Vec<ReaderPlan<'_>> = plan
                .readers
                .iter()
                .map(|(d, policy)| ReaderPlan {
                    binder: d.binder.as_ref(),
                    node: d.endpoint.node(),
                    type_name: d.endpoint.type_tag().name(),
                    policy: *policy,
                })
                .collect();

            let wired = plan
                .writer
                .binder
                .wire(&plan.channel, &readers, sink.as_ref())?;

            if let (Some(peek), Some((first, _))) = (plan.peek, plan.readers.first()) {
                first.binder.share_with(peek.binder.as_ref())?;
            }

            for (index, ((reader, _), wired)) in plan.readers.iter().zip(wired).enumerate() {
                let wiring = Wiring {
                    name: plan.channel.name.clone(),
                    instance: plan.channel.instance,
                    writer: plan.writer.endpoint.kind(),
                    reader: reader.endpoint.kind(),
                    writer_node: plan.channel.writer_node,
                    reader_node: reader.endpoint.node(),
                    fanout_index: index,
                    bandwidth: plan.channel.bandwidth,
                    latency: plan.channel.latency,
                    rows: plan.channel.latency as usize + 1 + plan.channel.margin,
                    peeked: index == 0 && plan.peek.is_some(),
                    edge: wired.edge,
                };
                debug!(
                    port = %wiring.name,
                    instance = wiring.instance,
                    writer = %wiring.writer,
                    reader = %wiring.reader,
                    bandwidth = wiring.bandwidth,
                    latency = wiring.latency,
                    "channel connected"
                );
                report.wirings.push(wiring.clone());
                channels.push(Channel {
                    wiring,
                    probe: wired.probe,
                });
            }
        }

        for d in &declared {
            d.binder.endpoint().lock().mark_connected();
        }

        info!(
            endpoints = declared.len(),
            channels = report.channel_count(),
            "connection pass complete"
        );
        inner.channels = channels;
        inner.report = Some(report.clone());
        Ok(report)
    }

    /// Drops every buffered item on every connected channel.
    pub fn clear_all(&self) {
        for channel in &self.inner.lock().channels {
            channel.probe.clear();
        }
    }

    /// Number of items buffered over all channels.
    pub fn occupancy(&self) -> usize {
        self.inner
            .lock()
            .channels
            .iter()
            .map(|c| c.probe.occupancy())
            .sum()
    }

    /// Collects per-channel statistics.
    pub fn stats(&self) -> PortStats {
        let inner = self.inner.lock();
        let mut stats = PortStats::new();
        for channel in &inner.channels {
            let w = &channel.wiring;
            stats.push(ChannelSummary {
                name: w.name.clone(),
                instance: w.instance,
                fanout_index: w.fanout_index,
                reader: w.reader,
                bandwidth: w.bandwidth,
                latency: w.latency,
                stats: channel.probe.stats(),
            });
        }
        stats
    }

    /// Exports registry and channel statistics as JSON.
    pub fn export_stats(&self) -> serde_json::Value {
        let (endpoints, connected) = {
            let inner = self.inner.lock();
            (inner.entries.len(), inner.closed)
        };
        serde_json::json!({
            "registry": {
                "endpoints": endpoints,
                "connected": connected,
            },
            "ports": self.stats().to_value(),
        })
    }
}

impl fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PortRegistry")
            .field("endpoints", &inner.entries.len())
            .field("closed", &inner.closed)
            .field("channels", &inner.channels.len())
            .finish()
    }
}

struct GroupPlan<'a> {
    writer: &'a Declared,
    readers: Vec<(&'a Declared, AccumulationPolicy)>,
    peek: Option<&'a Declared>,
    channel: ChannelPlan,
}

/// Agrees on one value among all the endpoints that declare it.
fn agree(
    values: impl IntoIterator<Item = Option<u32>>,
    mismatch: impl FnOnce(u32, u32) -> ConnectError,
) -> Result<Option<u32>, ConnectError> {
    let mut agreed: Option<u32> = None;
    for value in values.into_iter().flatten() {
        match agreed {
            None => agreed = Some(value),
            Some(first) if first != value => return Err(mismatch(first, value)),
            Some(_) => {}
        }
    }
    Ok(agreed)
}

/// Validates one `(name, instance)` group and decides its storages.
///
/// Returns `None` for groups made only of config endpoints.
fn plan_group<'a>(
    group: &'a [Declared],
    config: &PortsConfig,
) -> Result<Option<GroupPlan<'a>>, ConnectError> {
    let name = group[0].key.name.clone();
    let instance = group[0].key.instance;

    let mut writers = Vec::new();
    let mut readers = Vec::new();
    let mut peeks = Vec::new();
    let mut configs = Vec::new();
    for d in group {
        match d.endpoint.kind() {
            kind if kind.is_producer() => writers.push(d),
            kind if kind.is_consumer() => readers.push(d),
            PortKind::Peek => peeks.push(d),
            _ => configs.push(d),
        }
    }

    let writer = match writers.as_slice() {
        [] => {
            if let Some(orphan) = readers.first().or(peeks.first()) {
                return Err(ConnectError::UnmatchedConsumer {
                    name,
                    instance,
                    kind: orphan.endpoint.kind(),
                });
            }
            return Ok(None);
        }
        [writer] => *writer,
        _ => return Err(ConnectError::DuplicateProducer { name, instance }),
    };
    if readers.is_empty() {
        return Err(ConnectError::UnmatchedProducer { name, instance });
    }
    if peeks.len() > 1 {
        return Err(ConnectError::DuplicatePeek { name, instance });
    }

    let writer_type = writer.endpoint.type_tag();
    for other in readers.iter().chain(peeks.iter()) {
        if other.endpoint.type_tag() != writer_type {
            return Err(ConnectError::TypeMismatch {
                name,
                instance,
                writer_type: writer_type.name(),
                reader_type: other.endpoint.type_tag().name(),
            });
        }
    }
    let writer_kind = writer.endpoint.kind();
    for reader in &readers {
        if !writer_kind.can_drive(reader.endpoint.kind()) {
            return Err(ConnectError::IncompatibleKinds {
                name,
                instance,
                writer: writer_kind,
                reader: reader.endpoint.kind(),
            });
        }
    }
    if readers.len() != writer.endpoint.fanout() {
        return Err(ConnectError::FanoutMismatch {
            name,
            instance,
            expected: writer.endpoint.fanout(),
            found: readers.len(),
        });
    }

    // Config endpoints count whole cycles; phase channels count half cycles.
    let scale = if writer_kind.is_phase() { 2 } else { 1 };
    let fixed = config.find_channel(&name, instance);
    let endpoints = || std::iter::once(writer).chain(readers.iter().copied());

    let bandwidth = agree(
        endpoints()
            .map(|d| d.endpoint.bandwidth())
            .chain(configs.iter().map(|d| d.endpoint.bandwidth()))
            .chain(fixed.map(|ch| Some(ch.bandwidth))),
        |first, second| ConnectError::BandwidthMismatch {
            name: name.clone(),
            instance,
            first,
            second,
        },
    )?
    .ok_or_else(|| ConnectError::MissingBandwidth {
        name: name.clone(),
        instance,
    })?;

    let latency = agree(
        endpoints()
            .map(|d| d.endpoint.latency())
            .chain(configs.iter().map(|d| d.endpoint.latency().map(|l| l * scale)))
            .chain(fixed.map(|ch| Some(ch.latency * scale))),
        |first, second| ConnectError::LatencyMismatch {
            name: name.clone(),
            instance,
            first,
            second,
        },
    )?
    .ok_or_else(|| ConnectError::MissingLatency {
        name: name.clone(),
        instance,
    })?;

    let readers = readers
        .into_iter()
        .map(|d| {
            let policy = match d.endpoint.kind() {
                PortKind::ReadSkid => config.accumulation_policy(false),
                PortKind::ReadStall => config.accumulation_policy(true),
                kind => kind.default_policy(),
            };
            (d, policy)
        })
        .collect();

    Ok(Some(GroupPlan {
        writer,
        readers,
        peek: peeks.first().copied(),
        channel: ChannelPlan {
            name,
            instance,
            bandwidth,
            latency,
            margin: config.ports.lookahead_margin,
            writer_node: writer.endpoint.node(),
        },
    }))
}
