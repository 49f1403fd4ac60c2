//! A single cycle row: the items written to a channel in one cycle.

use crate::types::Cycle;

/// One row of a ring storage.
///
/// A row is stamped with the cycle it was filled in and holds up to
/// `bandwidth` items in its fixed slot array. The live items occupy
/// `[start, end)`; `start` advances as items are drained and both cursors
/// rewind to 0 only when the row is stamped with a new cycle.
#[derive(Clone, Debug)]
pub struct CycleRow<T> {
    stamp: Option<Cycle>,
    start: usize,
    end: usize,
    slots: Box<[T]>,
}

impl<T: Default> CycleRow<T> {
    /// Creates an unwritten row with `bandwidth` neutral slots.
    pub fn new(bandwidth: usize) -> Self {
        Self {
            stamp: None,
            start: 0,
            end: 0,
            slots: (0..bandwidth).map(|_| T::default()).collect(),
        }
    }

    /// Stamps the row with `cycle` and rewinds its cursors.
    ///
    /// Slots still holding undrained items are reset to their neutral value.
    pub fn restamp(&mut self, cycle: Cycle) {
        for slot in &mut self.slots[self.start..self.end] {
            *slot = T::default();
        }
        self.stamp = Some(cycle);
        self.start = 0;
        self.end = 0;
    }

    /// Returns the row to its unwritten state.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = T::default();
        }
        self.stamp = None;
        self.start = 0;
        self.end = 0;
    }

    /// Appends an item, handing it back if the row is at bandwidth.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        match self.slots.get_mut(self.end) {
            Some(slot) => {
                *slot = item;
                self.end += 1;
                Ok(())
            }
            None => Err(item),
        }
    }

    /// Removes the oldest live item, leaving a neutral value in its slot.
    pub fn take_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = std::mem::take(&mut self.slots[self.start]);
        self.start += 1;
        Some(item)
    }
}

impl<T> CycleRow<T> {
    /// Returns the cycle this row was written in, if any.
    #[inline]
    pub fn stamp(&self) -> Option<Cycle> {
        self.stamp
    }

    /// Shifts the row's stamp by `delay` cycles.
    pub fn shift(&mut self, delay: i64) {
        if let Some(stamp) = self.stamp.as_mut() {
            *stamp = stamp.saturating_add_signed(delay);
        }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of live items.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when every written item has been drained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when the row holds `bandwidth` live items.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.slots.len()
    }

    /// True while another item fits in this cycle's slots.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.end < self.slots.len()
    }

    /// Returns the oldest live item.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.get(self.start)
    }

    /// Returns the item in slot `position` if it is live.
    #[inline]
    pub fn get(&self, position: usize) -> Option<&T> {
        if position >= self.start && position < self.end {
            self.slots.get(position)
        } else {
            None
        }
    }

    /// Returns the row's capacity.
    #[inline]
    pub fn bandwidth(&self) -> usize {
        self.slots.len()
    }
}
