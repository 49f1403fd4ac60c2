//! Item-movement notifications for external event consumers.
//!
//! A channel can be observed by an [`EventSink`], typically an event
//! visualization or trace recorder living outside this crate. At
//! connection time the registry asks the sink for one edge per storage;
//! afterwards every successful write of an observable payload reports a
//! move along that edge.
//!
//! When no sink is installed, storages carry no tap and the write path
//! skips notification with a single branch.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::types::{Cycle, EdgeId, ItemId, NodeId};

/// Static description of a channel edge, announced once per storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDesc {
    /// Unit owning the write endpoint
    pub src_node: NodeId,
    /// Unit owning the read endpoint
    pub dst_node: NodeId,
    /// Items per cycle row
    pub bandwidth: u32,
    /// Cycles between write and earliest read
    pub latency: u32,
    /// Channel name
    pub name: String,
}

/// Receiver of channel events.
///
/// Implementations must be cheap to call: `move_item` runs on the write
/// path of every observable payload.
pub trait EventSink: Send + Sync {
    /// Registers a new edge and returns its identifier.
    fn new_edge(&self, edge: &EdgeDesc) -> EdgeId;

    /// Reports that `item` was written into the channel identified by `edge`.
    fn move_item(&self, edge: EdgeId, item: ItemId, cycle: Cycle);
}

/// The connection between one storage and an event sink.
#[derive(Clone)]
pub struct EventTap {
    edge: EdgeId,
    sink: Arc<dyn EventSink>,
}

impl EventTap {
    /// Announces `desc` to `sink` and returns a tap bound to the new edge.
    pub fn connect(sink: Arc<dyn EventSink>, desc: &EdgeDesc) -> Self {
        let edge = sink.new_edge(desc);
        tracing::trace!(edge, channel = %desc.name, "event edge created");
        Self { edge, sink }
    }

    /// Returns the edge identifier handed out by the sink.
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    /// Reports an item move along this edge.
    #[inline]
    pub fn notify(&self, item: ItemId, cycle: Cycle) {
        self.sink.move_item(self.edge, item, cycle);
    }
}

impl fmt::Debug for EventTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTap").field("edge", &self.edge).finish()
    }
}

/// A recorded item move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub edge: EdgeId,
    pub item: ItemId,
    pub cycle: Cycle,
}

#[derive(Debug, Default)]
struct Recording {
    edges: Vec<EdgeDesc>,
    moves: Vec<MoveRecord>,
}

/// An in-memory sink that records every edge and move it receives.
///
/// Edge identifiers are handed out in announcement order, starting at 0.
///
/// # Example
///
/// ```
/// use cycleport::event::{EdgeDesc, EventSink, RecordingSink};
///
/// let sink = RecordingSink::new();
/// let edge = sink.new_edge(&EdgeDesc {
///     src_node: 1,
///     dst_node: 2,
///     bandwidth: 1,
///     latency: 3,
///     name: "fetch_to_decode".to_string(),
/// });
/// sink.move_item(edge, 99, 10);
///
/// assert_eq!(sink.edges().len(), 1);
/// assert_eq!(sink.moves()[0].item, 99);
/// ```
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recording>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all announced edges in order.
    pub fn edges(&self) -> Vec<EdgeDesc> {
        self.inner.lock().edges.clone()
    }

    /// Returns all recorded moves in order.
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.inner.lock().moves.clone()
    }

    /// Returns the recorded moves along one edge.
    pub fn moves_on(&self, edge: EdgeId) -> Vec<MoveRecord> {
        self.inner
            .lock()
            .moves
            .iter()
            .filter(|m| m.edge == edge)
            .cloned()
            .collect()
    }

    /// Forgets all recorded moves, keeping the edges.
    pub fn clear_moves(&self) {
        self.inner.lock().moves.clear();
    }
}

impl EventSink for RecordingSink {
    fn new_edge(&self, edge: &EdgeDesc) -> EdgeId {
        let mut inner = self.inner.lock();
        let id = inner.edges.len() as EdgeId;
        inner.edges.push(edge.clone());
        id
    }

    fn move_item(&self, edge: EdgeId, item: ItemId, cycle: Cycle) {
        self.inner.lock().moves.push(MoveRecord { edge, item, cycle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str) -> EdgeDesc {
        EdgeDesc {
            src_node: 1,
            dst_node: 2,
            bandwidth: 2,
            latency: 1,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_recording_sink_edges() {
        let sink = RecordingSink::new();
        assert_eq!(sink.new_edge(&desc("a")), 0);
        assert_eq!(sink.new_edge(&desc("b")), 1);

        let edges = sink.edges();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[1].name, "b");
    }

    #[test]
    fn test_tap_notifies_sink() {
        let sink = Arc::new(RecordingSink::new());
        sink.new_edge(&desc("unrelated"));

        let tap = EventTap::connect(sink.clone(), &desc("observed"));
        assert_eq!(tap.edge(), 1);

        tap.notify(5, 100);
        tap.notify(6, 101);

        assert!(sink.moves_on(0).is_empty());
        let moves = sink.moves_on(1);
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0], MoveRecord { edge: 1, item: 5, cycle: 100 });

        sink.clear_moves();
        assert!(sink.moves().is_empty());
        assert_eq!(sink.edges().len(), 2);
    }
}
