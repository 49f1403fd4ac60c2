//! Fixed-size rings addressed through validated cursors.
//!
//! Storages and slot queues never do modulo arithmetic on raw integers.
//! A [`RingCursor`] remembers the size of the ring it was created for, can
//! only be moved by whole steps that wrap at that size, and is checked
//! against the ring whenever it is used to index one.

use std::ops::{Index, IndexMut};

/// A position inside a ring of a fixed size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RingCursor {
    index: usize,
    size: usize,
}

impl RingCursor {
    fn new(index: usize, size: usize) -> Self {
        debug_assert!(index < size, "cursor {index} outside ring of {size}");
        Self { index, size }
    }

    /// Returns the raw slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }

    /// Returns the size of the ring this cursor walks.
    #[inline]
    pub fn ring_size(self) -> usize {
        self.size
    }

    /// Returns the cursor one slot further, wrapping to the first slot.
    #[inline]
    pub fn next(self) -> Self {
        let index = if self.index + 1 == self.size {
            0
        } else {
            self.index + 1
        };
        Self { index, size: self.size }
    }

    /// Returns the cursor one slot back, wrapping to the last slot.
    #[inline]
    pub fn prev(self) -> Self {
        let index = if self.index == 0 {
            self.size - 1
        } else {
            self.index - 1
        };
        Self { index, size: self.size }
    }

    /// Moves this cursor one slot forward.
    #[inline]
    pub fn advance(&mut self) {
        *self = self.next();
    }

    /// Number of forward steps needed to get from `self` to `other`.
    pub fn distance_to(self, other: RingCursor) -> usize {
        debug_assert_eq!(self.size, other.size);
        (other.index + self.size - self.index) % self.size
    }
}

/// A non-empty, fixed-size sequence of slots addressed by [`RingCursor`]s.
#[derive(Clone, Debug)]
pub struct Ring<E> {
    slots: Box<[E]>,
}

impl<E> Ring<E> {
    /// Builds a ring of `size` slots, initializing each with `init(index)`.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn from_fn(size: usize, mut init: impl FnMut(usize) -> E) -> Self {
        assert!(size > 0, "a ring needs at least one slot");
        Self {
            slots: (0..size).map(&mut init).collect(),
        }
    }

    /// Returns the number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: rings have at least one slot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns a cursor on the first slot.
    #[inline]
    pub fn first(&self) -> RingCursor {
        RingCursor::new(0, self.len())
    }

    /// Returns a cursor on the last slot.
    #[inline]
    pub fn last(&self) -> RingCursor {
        RingCursor::new(self.len() - 1, self.len())
    }

    /// Returns a cursor on `index`, or `None` if it is out of range.
    pub fn cursor(&self, index: usize) -> Option<RingCursor> {
        (index < self.len()).then(|| RingCursor::new(index, self.len()))
    }

    /// Iterates over all slots in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.slots.iter()
    }

    /// Iterates mutably over all slots in index order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, E> {
        self.slots.iter_mut()
    }
}

impl<E> Index<RingCursor> for Ring<E> {
    type Output = E;

    #[inline]
    fn index(&self, cursor: RingCursor) -> &E {
        debug_assert_eq!(cursor.size, self.slots.len(), "cursor used on a foreign ring");
        &self.slots[cursor.index]
    }
}

impl<E> IndexMut<RingCursor> for Ring<E> {
    #[inline]
    fn index_mut(&mut self, cursor: RingCursor) -> &mut E {
        debug_assert_eq!(cursor.size, self.slots.len(), "cursor used on a foreign ring");
        &mut self.slots[cursor.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_wraps() {
        let ring = Ring::from_fn(3, |i| i * 10);
        let mut cursor = ring.last();
        assert_eq!(cursor.index(), 2);

        cursor.advance();
        assert_eq!(cursor.index(), 0);
        assert_eq!(ring[cursor], 0);

        assert_eq!(cursor.prev().index(), 2);
        assert_eq!(cursor.next().next().index(), 2);
    }

    #[test]
    fn test_distance() {
        let ring = Ring::from_fn(5, |_| ());
        let a = ring.cursor(3).unwrap();
        let b = ring.cursor(1).unwrap();
        assert_eq!(a.distance_to(b), 3);
        assert_eq!(b.distance_to(a), 2);
        assert_eq!(a.distance_to(a), 0);
    }

    #[test]
    fn test_cursor_bounds() {
        let ring = Ring::from_fn(2, |_| 0u8);
        assert!(ring.cursor(1).is_some());
        assert!(ring.cursor(2).is_none());
        assert_eq!(ring.len(), 2);
    }

    #[test]
    #[should_panic(expected = "at least one slot")]
    fn test_empty_ring_rejected() {
        let _ = Ring::from_fn(0, |_| 0u8);
    }
}
