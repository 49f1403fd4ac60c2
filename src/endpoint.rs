//! Endpoint identity and set-once configuration.
//!
//! A [`PortEndpoint`] is the typeless half of every port: it records who
//! the endpoint is (name, scope, instance, owning unit), what role it plays
//! ([`PortKind`]), which payload type it carries, and the channel
//! parameters declared on it. The connector reads these descriptors to pair
//! writers with readers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SetupError;
use crate::payload::TypeTag;
use crate::storage::{AccumulationPolicy, ReadMode};
use crate::types::{InstanceId, NodeId};

/// Role of an endpoint.
///
/// The declaration order doubles as the tie-break when endpoints with the
/// same name and instance are sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PortKind {
    Write,
    Read,
    WriteSkid,
    ReadSkid,
    WriteStall,
    ReadStall,
    WritePhase,
    ReadPhase,
    Peek,
    Config,
}

impl PortKind {
    /// True for roles that own a channel's writing side.
    pub fn is_producer(self) -> bool {
        matches!(
            self,
            PortKind::Write | PortKind::WriteSkid | PortKind::WriteStall | PortKind::WritePhase
        )
    }

    /// True for roles that drain a channel.
    pub fn is_consumer(self) -> bool {
        matches!(
            self,
            PortKind::Read | PortKind::ReadSkid | PortKind::ReadStall | PortKind::ReadPhase
        )
    }

    /// True for the half-cycle roles.
    pub fn is_phase(self) -> bool {
        matches!(self, PortKind::WritePhase | PortKind::ReadPhase)
    }

    /// True if a producer of this role may feed a consumer of role `reader`.
    ///
    /// Phase ports count time in half cycles and only pair with each other;
    /// every other writer may drive every other reader.
    pub fn can_drive(self, reader: PortKind) -> bool {
        self.is_producer() && reader.is_consumer() && self.is_phase() == reader.is_phase()
    }

    /// Read discipline applied by consumers of this role.
    pub fn read_mode(self) -> ReadMode {
        match self {
            PortKind::ReadSkid | PortKind::ReadStall | PortKind::Peek => ReadMode::Relaxed,
            _ => ReadMode::Strict,
        }
    }

    /// Over-accumulation policy a consumer of this role gets unless
    /// configured otherwise.
    pub fn default_policy(self) -> AccumulationPolicy {
        match self {
            PortKind::ReadSkid => AccumulationPolicy::Warn,
            _ => AccumulationPolicy::Error,
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Sort and match key of an endpoint: `(name, instance, kind)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortKey {
    pub name: String,
    pub instance: InstanceId,
    pub kind: PortKind,
}

impl PortKey {
    /// True if both keys name the same channel, whatever their roles.
    pub fn same_channel(&self, other: &PortKey) -> bool {
        self.name == other.name && self.instance == other.instance
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] ({})", self.name, self.instance, self.kind)
    }
}

/// One side of a channel.
///
/// Bandwidth and latency are set at most once each and only before the
/// connection pass; the name is assigned once by [`PortEndpoint::init`].
#[derive(Clone, Debug)]
pub struct PortEndpoint {
    kind: PortKind,
    type_tag: TypeTag,
    name: Option<String>,
    scope: Option<String>,
    node: NodeId,
    instance: InstanceId,
    bandwidth: Option<u32>,
    latency: Option<u32>,
    fanout: usize,
    connected: bool,
    registered: bool,
}

impl PortEndpoint {
    /// Creates an unnamed endpoint of `kind` carrying `type_tag`.
    pub fn new(kind: PortKind, type_tag: TypeTag) -> Self {
        Self {
            kind,
            type_tag,
            name: None,
            scope: None,
            node: 0,
            instance: 0,
            bandwidth: None,
            latency: None,
            fanout: 1,
            connected: false,
            registered: true,
        }
    }

    /// Marks the endpoint as declared too late to take part in connection.
    pub(crate) fn reject_registration(&mut self) {
        self.registered = false;
    }

    /// Label used in diagnostics before and after naming.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<unnamed {}>", self.kind),
        }
    }

    /// Assigns the endpoint's identity.
    pub fn init(
        &mut self,
        name: &str,
        scope: Option<&str>,
        node: NodeId,
        instance: InstanceId,
    ) -> Result<(), SetupError> {
        if self.connected {
            return Err(SetupError::AlreadyConnected { port: self.label() });
        }
        if !self.registered {
            return Err(SetupError::RegistryClosed {
                port: name.to_string(),
            });
        }
        if let Some(current) = &self.name {
            return Err(SetupError::AlreadyInitialized {
                current: current.clone(),
                requested: name.to_string(),
            });
        }
        if name.is_empty() {
            return Err(SetupError::EmptyName);
        }

        self.name = Some(name.to_string());
        self.scope = scope.map(str::to_string);
        self.node = node;
        self.instance = instance;

        tracing::debug!(port = name, instance, node, kind = %self.kind, "port declared");
        Ok(())
    }

    /// Sets the bandwidth. Succeeds once, and only before connection.
    pub fn set_bandwidth(&mut self, bandwidth: u32) -> Result<(), SetupError> {
        if self.connected {
            return Err(SetupError::AlreadyConnected { port: self.label() });
        }
        if let Some(current) = self.bandwidth {
            return Err(SetupError::BandwidthAlreadySet {
                port: self.label(),
                current,
            });
        }
        if bandwidth == 0 {
            return Err(SetupError::ZeroBandwidth { port: self.label() });
        }
        self.bandwidth = Some(bandwidth);
        Ok(())
    }

    /// Sets the latency. Succeeds once, and only before connection.
    pub fn set_latency(&mut self, latency: u32) -> Result<(), SetupError> {
        if self.connected {
            return Err(SetupError::AlreadyConnected { port: self.label() });
        }
        if let Some(current) = self.latency {
            return Err(SetupError::LatencyAlreadySet {
                port: self.label(),
                current,
            });
        }
        self.latency = Some(latency);
        Ok(())
    }

    /// Sets bandwidth then latency.
    pub fn config(&mut self, bandwidth: u32, latency: u32) -> Result<(), SetupError> {
        self.set_bandwidth(bandwidth)?;
        self.set_latency(latency)
    }

    /// Names the endpoint, then sets bandwidth and latency.
    pub fn init_config(
        &mut self,
        name: &str,
        bandwidth: u32,
        latency: u32,
        node: NodeId,
    ) -> Result<(), SetupError> {
        self.init(name, None, node, 0)?;
        self.config(bandwidth, latency)
    }

    /// Sets how many readers a writer broadcasts to.
    pub fn set_fanout(&mut self, fanout: usize) -> Result<(), SetupError> {
        if self.connected {
            return Err(SetupError::AlreadyConnected { port: self.label() });
        }
        if fanout == 0 {
            return Err(SetupError::ZeroFanout { port: self.label() });
        }
        // A stalled reader would have to hold back its siblings.
        if self.kind == PortKind::WriteStall && fanout != 1 {
            return Err(SetupError::FanoutUnsupported {
                port: self.label(),
                kind: self.kind,
                fanout,
            });
        }
        self.fanout = fanout;
        Ok(())
    }

    pub(crate) fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Returns the sort key, or `None` while the endpoint is unnamed.
    pub fn key(&self) -> Option<PortKey> {
        self.name.as_ref().map(|name| PortKey {
            name: name.clone(),
            instance: self.instance,
            kind: self.kind,
        })
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn bandwidth(&self) -> Option<u32> {
        self.bandwidth
    }

    pub fn latency(&self) -> Option<u32> {
        self.latency
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}
