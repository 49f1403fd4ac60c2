//! Dynamically allocated multi-queue buffer.
//!
//! A [`DamQueue`] holds up to `capacity` items in numbered slots. Items may
//! leave in any order: deleting a slot leaves a hole that the next
//! [`store`](DamQueue::store) can fill, and the head only moves forward
//! once the oldest slot is free. Models buffers shared by several logical
//! queues, such as a retry buffer whose entries complete out of order.
//!
//! The ring carries one spare slot that is always empty. It marks the end
//! of a search, so searches never need an occupancy count.

use crate::ring::{Ring, RingCursor};

/// Fixed-capacity buffer with slot-addressed, out-of-order removal.
#[derive(Clone, Debug)]
pub struct DamQueue<T> {
    slots: Ring<Option<T>>,
    head: RingCursor,
    /// `None` until the first `next_entry` after a reset.
    search: Option<RingCursor>,
    len: usize,
    capacity: usize,
}

impl<T> DamQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        let slots = Ring::from_fn(capacity + 1, |_| None);
        let head = slots.first();
        Self {
            slots,
            head,
            search: None,
            len: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn occupancy(&self) -> usize {
        self.len
    }

    pub fn free_space(&self) -> usize {
        self.capacity - self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Slot of the oldest entry, if any.
    pub fn head(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.head.index())
    }

    /// Stores `item` in the first free slot after the head.
    ///
    /// Returns the slot number, or hands the item back if the queue is full.
    pub fn store(&mut self, item: T) -> Result<usize, T> {
        if self.is_full() {
            return Err(item);
        }

        let slot = if self.is_empty() {
            self.head
        } else {
            let mut cursor = self.head.next();
            while self.slots[cursor].is_some() {
                cursor.advance();
            }
            cursor
        };
        debug_assert!(slot != self.head.prev() || self.is_empty());

        self.slots[slot] = Some(item);
        self.len += 1;
        Ok(slot.index())
    }

    /// Returns the item in `slot`.
    pub fn get(&self, slot: usize) -> Option<&T> {
        let cursor = self.slots.cursor(slot)?;
        self.slots[cursor].as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        let cursor = self.slots.cursor(slot)?;
        self.slots[cursor].as_mut()
    }

    /// Removes and returns the item in `slot`.
    ///
    /// The head then skips every leading hole.
    pub fn del_entry(&mut self, slot: usize) -> Option<T> {
        let cursor = self.slots.cursor(slot)?;
        let item = self.slots[cursor].take()?;
        self.len -= 1;

        let mark = self.head.prev();
        while self.slots[self.head].is_none() && self.head != mark {
            self.head.advance();
        }
        Some(item)
    }

    /// Moves the search cursor to the next occupied slot and returns it.
    ///
    /// The first call after [`reset_search`](Self::reset_search) yields the
    /// head. Returns `None` once the search has passed the newest entry; the
    /// call after that starts over from the head.
    pub fn next_entry(&mut self) -> Option<(usize, &T)> {
        let mark = self.head.prev();
        let mut cursor = match self.search {
            None => self.head,
            Some(current) => current.next(),
        };
        while cursor != mark && self.slots[cursor].is_none() {
            cursor.advance();
        }

        self.search = Some(cursor);
        self.slots[cursor].as_ref().map(|item| (cursor.index(), item))
    }

    /// Slot under the search cursor.
    pub fn current_entry(&self) -> Option<usize> {
        let cursor = self.search?;
        self.slots[cursor].as_ref().map(|_| cursor.index())
    }

    /// Rewinds the search cursor to the head.
    pub fn reset_search(&mut self) {
        self.search = None;
    }

    /// Iterates over the occupied slots from the head onward.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        let mut cursor = self.head;
        (0..self.slots.len()).filter_map(move |_| {
            let at = cursor;
            cursor.advance();
            self.slots[at].as_ref().map(|item| (at.index(), item))
        })
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = self.slots.first();
        self.search = None;
        self.len = 0;
    }
}
