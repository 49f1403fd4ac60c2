//! Per-channel ring storage.
//!
//! A [`RingStorage`] backs one writer/reader pair. It holds
//! `latency + 1 + margin` [`CycleRow`]s arranged in a ring; each write
//! either appends to the row stamped with the current cycle or stamps the
//! next row, and each read drains the oldest row once its stamp plus the
//! channel latency has been reached.
//!
//! ```text
//!            read                      write
//!             |                          |
//!   +------+------+------+------+------+------+------+
//!   |      | c=10 | c=11 | c=12 |  ..  | c=14 |      |
//!   +------+------+------+------+------+------+------+
//! ```
//!
//! Usage violations are reported as [`PortError`]s after being logged at
//! `error` level; reads that find nothing due return `Ok(None)`.

mod row;

pub use row::CycleRow;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::error::{PortError, PortResult};
use crate::event::EventTap;
use crate::payload::Payload;
use crate::ring::{Ring, RingCursor};
use crate::stats::ChannelStats;
use crate::types::Cycle;

/// Rows added to every ring beyond `latency + 1`, so that engines running
/// slightly ahead of the logical cycle can keep writing.
pub const LOOKAHEAD_MARGIN: usize = 3;

/// A storage shared between the endpoints of one channel.
pub type SharedStorage<T> = Arc<Mutex<RingStorage<T>>>;

/// Wraps a storage for sharing between a writer and a reader.
pub fn shared<T>(storage: RingStorage<T>) -> SharedStorage<T> {
    Arc::new(Mutex::new(storage))
}

/// How a read treats the ready cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// The item must be read exactly in its ready cycle.
    Strict,
    /// The item may be read in any cycle at or after its ready cycle.
    Relaxed,
}

/// What a relaxed read does when the writer filled `latency + 1` rows in a
/// row without any read in between.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationPolicy {
    /// Fail the read with [`PortError::Overaccumulated`].
    #[default]
    Error,
    /// Log a warning and complete the read.
    Warn,
    /// Ignore.
    Off,
}

#[derive(Clone, Debug)]
struct Layout<T> {
    rows: Ring<CycleRow<T>>,
    read: RingCursor,
    write: RingCursor,
    peek: RingCursor,
    peek_start: usize,
    peek_stamp: Option<Cycle>,
}

impl<T: Default> Layout<T> {
    fn new(size: usize, bandwidth: usize) -> Self {
        let rows = Ring::from_fn(size, |_| CycleRow::new(bandwidth));
        let first = rows.first();
        let last = rows.last();
        Self {
            rows,
            read: first,
            write: last,
            peek: first,
            peek_start: 0,
            peek_stamp: None,
        }
    }

    fn rewind(&mut self) {
        for row in self.rows.iter_mut() {
            row.reset();
        }
        self.read = self.rows.first();
        self.write = self.rows.last();
        self.peek = self.rows.first();
        self.peek_start = 0;
        self.peek_stamp = None;
    }
}

/// Logs a usage violation and hands it back for returning.
fn violation(err: PortError) -> PortError {
    error!(port = err.port(), error = %err, "port usage violation");
    err
}

/// The cycle-stamped ring buffer behind one channel.
#[derive(Debug)]
pub struct RingStorage<T> {
    name: String,
    layout: Option<Layout<T>>,
    bandwidth: u32,
    latency: u32,
    margin: usize,
    /// Cycle in which the reader last started draining a fresh row.
    drained_at: Option<Cycle>,
    active: bool,
    stalled: bool,
    last_written: Option<Cycle>,
    last_accessed: Option<Cycle>,
    sequential_writes: u64,
    policy: AccumulationPolicy,
    tap: Option<EventTap>,
    stats: ChannelStats,
    buffered: usize,
}

impl<T: Payload> RingStorage<T> {
    /// Creates an unallocated storage for the channel `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_margin(name, LOOKAHEAD_MARGIN)
    }

    /// Creates an unallocated storage with a custom lookahead margin.
    pub fn with_margin(name: impl Into<String>, margin: usize) -> Self {
        Self {
            name: name.into(),
            layout: None,
            bandwidth: 0,
            latency: 0,
            margin,
            drained_at: None,
            active: true,
            stalled: false,
            last_written: None,
            last_accessed: None,
            sequential_writes: 0,
            policy: AccumulationPolicy::default(),
            tap: None,
            stats: ChannelStats::default(),
            buffered: 0,
        }
    }

    /// Allocates `latency + 1 + margin` rows of `bandwidth` slots each.
    ///
    /// The write cursor starts on the last row so that the first write
    /// stamps row 0.
    pub fn create_storage(&mut self, latency: u32, bandwidth: u32) -> PortResult<()> {
        if self.layout.is_some() {
            return Err(violation(PortError::StorageExists {
                port: self.name.clone(),
            }));
        }
        if bandwidth == 0 {
            return Err(violation(PortError::ZeroBandwidth {
                port: self.name.clone(),
            }));
        }

        let size = latency as usize + 1 + self.margin;
        self.layout = Some(Layout::new(size, bandwidth as usize));
        self.bandwidth = bandwidth;
        self.latency = latency;
        self.drained_at = None;
        self.sequential_writes = 0;
        self.buffered = 0;

        debug!(port = %self.name, latency, bandwidth, rows = size, "storage created");
        Ok(())
    }

    /// Releases the rows. Returns true if anything was allocated.
    pub fn delete_storage(&mut self) -> bool {
        self.buffered = 0;
        self.layout.take().is_some()
    }

    /// Checks that a write in `cycle` would be accepted, without changing
    /// anything.
    pub fn check_write(&self, cycle: Cycle) -> PortResult<()> {
        if self.stalled {
            return Err(violation(PortError::Stalled {
                port: self.name.clone(),
                cycle,
            }));
        }
        let Some(layout) = self.layout.as_ref() else {
            return Err(violation(PortError::NoStorage {
                port: self.name.clone(),
            }));
        };

        let current = &layout.rows[layout.write];
        match current.stamp() {
            Some(stamp) if stamp == cycle => {
                if !current.has_room() {
                    return Err(violation(PortError::BandwidthExceeded {
                        port: self.name.clone(),
                        cycle,
                        bandwidth: self.bandwidth as usize,
                    }));
                }
            }
            Some(last) if last > cycle => {
                return Err(violation(PortError::NonMonotonicWrite {
                    port: self.name.clone(),
                    cycle,
                    last,
                }));
            }
            _ => {
                let next = layout.write.next();
                if self.active && !layout.rows[next].is_empty() {
                    return Err(violation(PortError::Overrun {
                        port: self.name.clone(),
                        cycle,
                        row: next.index(),
                    }));
                }
            }
        }
        Ok(())
    }

    /// Writes `item` in `cycle`.
    pub fn write(&mut self, item: T, cycle: Cycle) -> PortResult<()> {
        self.check_write(cycle)?;
        let Some(layout) = self.layout.as_mut() else {
            return Err(PortError::NoStorage {
                port: self.name.clone(),
            });
        };

        if layout.rows[layout.write].stamp() != Some(cycle) {
            let next = layout.write.next();
            let row = &mut layout.rows[next];
            if !row.is_empty() {
                // Nobody reads this channel: recycle the stale row.
                self.buffered -= row.len();
            }
            row.restamp(cycle);
            layout.write = next;

            self.last_written = Some(cycle);
            self.sequential_writes += 1;
            self.stats.rows_filled += 1;
        }

        let item_id = self.tap.as_ref().and_then(|_| item.item_id());
        if layout.rows[layout.write].push(item).is_err() {
            return Err(violation(PortError::BandwidthExceeded {
                port: self.name.clone(),
                cycle,
                bandwidth: self.bandwidth as usize,
            }));
        }

        self.buffered += 1;
        self.stats.items_written += 1;
        self.stats.peak_occupancy = self.stats.peak_occupancy.max(self.buffered);
        self.stats.last_write_cycle = Some(cycle);

        if let (Some(tap), Some(id)) = (self.tap.as_ref(), item_id) {
            tap.notify(id, cycle);
        }
        Ok(())
    }

    /// Checks whether the front item may be taken in `cycle`.
    fn check_due(&self, cycle: Cycle, mode: ReadMode) -> PortResult<bool> {
        let Some(layout) = self.layout.as_ref() else {
            return Err(violation(PortError::NoStorage {
                port: self.name.clone(),
            }));
        };

        let row = &layout.rows[layout.read];
        if row.is_empty() || (self.drained_at == Some(cycle) && row.start() == 0) {
            return Ok(false);
        }
        let Some(stamp) = row.stamp() else {
            return Ok(false);
        };

        let ready = stamp + Cycle::from(self.latency);
        if ready > cycle {
            return Ok(false);
        }

        match mode {
            ReadMode::Strict if ready != cycle => {
                return Err(violation(PortError::WrongCycle {
                    port: self.name.clone(),
                    cycle,
                    expected: ready,
                }));
            }
            ReadMode::Strict => {}
            ReadMode::Relaxed => {
                let overaccumulated = self.sequential_writes == u64::from(self.latency) + 1
                    && self.last_written != Some(cycle);
                if overaccumulated {
                    let last_written = self.last_written.unwrap_or(stamp);
                    match self.policy {
                        AccumulationPolicy::Error => {
                            return Err(violation(PortError::Overaccumulated {
                                port: self.name.clone(),
                                cycle,
                                last_written,
                                writes: self.sequential_writes,
                            }));
                        }
                        AccumulationPolicy::Warn => warn!(
                            port = %self.name,
                            cycle,
                            last_written,
                            writes = self.sequential_writes,
                            "writes accumulated without a read"
                        ),
                        AccumulationPolicy::Off => {}
                    }
                }
            }
        }
        Ok(true)
    }

    /// Reads the next due item.
    ///
    /// Returns `Ok(None)` when nothing is due in `cycle`.
    pub fn read(&mut self, cycle: Cycle, mode: ReadMode) -> PortResult<Option<T>> {
        if !self.check_due(cycle, mode)? {
            self.stats.soft_misses += 1;
            return Ok(None);
        }
        self.sequential_writes = 0;

        let Some(layout) = self.layout.as_mut() else {
            return Ok(None);
        };
        let row = &mut layout.rows[layout.read];
        if row.start() == 0 {
            self.drained_at = Some(cycle);
        }
        let item = row.take_front();
        if row.is_empty() {
            layout.read.advance();
        }

        self.active = true;
        self.last_accessed = Some(cycle);
        if item.is_some() {
            self.buffered -= 1;
            self.stats.items_read += 1;
            self.stats.last_read_cycle = Some(cycle);
        }
        Ok(item)
    }

    /// Returns a copy of the next due item without consuming it.
    pub fn look(&self, cycle: Cycle, mode: ReadMode) -> PortResult<Option<T>> {
        if !self.check_due(cycle, mode)? {
            return Ok(None);
        }
        Ok(self
            .layout
            .as_ref()
            .and_then(|layout| layout.rows[layout.read].front().cloned()))
    }

    /// True if some item will be readable in `cycle`.
    ///
    /// Does not account for the per-cycle drain guard, so a subsequent read
    /// in the same cycle may still miss.
    pub fn something_to_read(&self, cycle: Cycle) -> bool {
        let Some(layout) = self.layout.as_ref() else {
            return false;
        };

        let mut cursor = layout.read;
        while layout.rows[cursor].is_empty() && cursor != layout.write {
            cursor.advance();
        }

        let row = &layout.rows[cursor];
        match row.stamp() {
            Some(stamp) if !row.is_empty() => stamp + Cycle::from(self.latency) <= cycle,
            _ => false,
        }
    }

    /// Shifts the stamp of every row by `delay` cycles.
    pub fn delay(&mut self, delay: i64) {
        if let Some(layout) = self.layout.as_mut() {
            for row in layout.rows.iter_mut() {
                row.shift(delay);
            }
            // Keep the peek cursor on the row it was walking.
            if let Some(stamp) = layout.peek_stamp.as_mut() {
                *stamp = stamp.saturating_add_signed(delay);
            }
            trace!(port = %self.name, delay, "storage delayed");
        }
    }

    /// Applies or releases backpressure.
    ///
    /// Stalling rejects further writes and postpones everything buffered by
    /// one cycle.
    pub fn stall(&mut self, stalled: bool) {
        self.stalled = stalled;
        if stalled {
            self.delay(1);
            self.stats.stalls += 1;
        }
    }

    /// Returns a copy of the next item under an independent peek cursor.
    ///
    /// The peek cursor walks the same rows as the reader but never consumes
    /// anything, so peeking does not change the outcome of any read.
    pub fn peek_next(&mut self, cycle: Cycle) -> Option<T> {
        let latency = Cycle::from(self.latency);
        let layout = self.layout.as_mut()?;

        if layout.rows[layout.peek].stamp() != layout.peek_stamp {
            // The row under the cursor was recycled.
            layout.peek = layout.read;
            layout.peek_start = 0;
            layout.peek_stamp = layout.rows[layout.peek].stamp();
        }

        let mut position = layout.peek_start.max(layout.rows[layout.peek].start());
        while position == layout.rows[layout.peek].end() && layout.peek != layout.write {
            layout.peek.advance();
            layout.peek_start = 0;
            layout.peek_stamp = layout.rows[layout.peek].stamp();
            position = layout.rows[layout.peek].start();
        }

        let row = &layout.rows[layout.peek];
        if position == row.end() {
            return None;
        }
        if row.stamp()? + latency > cycle {
            return None;
        }

        let item = row.get(position).cloned();
        layout.peek_start = position + 1;
        item
    }

    /// Rewinds the peek cursor to the reader's position.
    pub fn peek_reset(&mut self) {
        if let Some(layout) = self.layout.as_mut() {
            layout.peek = layout.read;
            layout.peek_start = 0;
            layout.peek_stamp = layout.rows[layout.read].stamp();
        }
    }

    /// Drops all buffered items and rewinds every cursor.
    pub fn clear(&mut self) {
        if let Some(layout) = self.layout.as_mut() {
            layout.rewind();
        }
        self.drained_at = None;
        self.stalled = false;
        self.sequential_writes = 0;
        self.buffered = 0;
        trace!(port = %self.name, "storage cleared");
    }

    /// True if a write in `cycle` would neither exceed the bandwidth nor
    /// land on an undrained row.
    pub fn writable(&self, cycle: Cycle) -> bool {
        let Some(layout) = self.layout.as_ref() else {
            return false;
        };
        if self.stalled {
            return false;
        }

        let current = &layout.rows[layout.write];
        if current.stamp() == Some(cycle) {
            current.has_room()
        } else {
            !self.active || layout.rows[layout.write.next()].is_empty()
        }
    }

    /// True if row `index` holds `bandwidth` live items.
    pub fn is_full(&self, index: usize) -> bool {
        self.row(index).is_some_and(CycleRow::is_full)
    }

    /// True if row `index` holds no live item (or does not exist).
    pub fn is_empty(&self, index: usize) -> bool {
        self.row(index).map_or(true, CycleRow::is_empty)
    }
}

impl<T> RingStorage<T> {
    fn row(&self, index: usize) -> Option<&CycleRow<T>> {
        let layout = self.layout.as_ref()?;
        let cursor = layout.rows.cursor(index)?;
        Some(&layout.rows[cursor])
    }

    /// Returns the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once rows have been allocated.
    pub fn is_allocated(&self) -> bool {
        self.layout.is_some()
    }

    pub fn bandwidth(&self) -> u32 {
        self.bandwidth
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    /// Number of rows, or 0 before allocation.
    pub fn buffer_size(&self) -> usize {
        self.layout.as_ref().map_or(0, |layout| layout.rows.len())
    }

    /// Index of the row currently being filled.
    pub fn write_index(&self) -> Option<usize> {
        self.layout.as_ref().map(|layout| layout.write.index())
    }

    /// Index of the row currently being drained.
    pub fn read_index(&self) -> Option<usize> {
        self.layout.as_ref().map(|layout| layout.read.index())
    }

    /// Stamp of the row currently being filled.
    pub fn latest_write(&self) -> Option<Cycle> {
        self.layout
            .as_ref()
            .and_then(|layout| layout.rows[layout.write].stamp())
    }

    /// Number of items written but not yet read.
    pub fn occupancy(&self) -> usize {
        self.buffered
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enables or disables overrun detection. A successful read re-enables it.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    pub fn last_written(&self) -> Option<Cycle> {
        self.last_written
    }

    pub fn last_accessed(&self) -> Option<Cycle> {
        self.last_accessed
    }

    pub fn policy(&self) -> AccumulationPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: AccumulationPolicy) {
        self.policy = policy;
    }

    /// Installs the event tap that receives item moves.
    pub fn set_tap(&mut self, tap: EventTap) {
        self.tap = Some(tap);
    }

    pub fn tap(&self) -> Option<&EventTap> {
        self.tap.as_ref()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}
