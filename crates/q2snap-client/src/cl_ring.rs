// cl_ring.rs -- power-of-two rings for frame history and entity states
//
// Both rings are indexed with a running sequence number anded with
// capacity - 1. The entity pool additionally tracks its write head so a
// reader can tell whether a slot still holds what it thinks it holds.

use rayon::prelude::*;

use q2snap_common::q_shared::EntityState;

use crate::error::{ParseError, ParseResult};

/// Distance from `index` to the next write position, in entries written.
pub fn pool_distance(head: i32, index: i32) -> i32 {
    head.wrapping_sub(index)
}

/// True when a delta base starting at `base` can no longer be merged: more
/// than `capacity - margin` entries were written since, so the slots it
/// needs are overwritten or about to be.
pub fn is_stale(head: i32, base: i32, capacity: usize, margin: usize) -> bool {
    let window = capacity.saturating_sub(margin) as i64;
    pool_distance(head, base) as i64 > window
}

/// True when the slot for `index` holds the entry written at `index`.
pub fn is_readable(head: i32, index: i32, capacity: usize) -> bool {
    let distance = pool_distance(head, index);
    distance > 0 && distance as i64 <= capacity as i64
}

/// Fixed ring of `T` addressed by a running sequence number.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: Vec<T>,
    mask: usize,
}

impl<T: Default + Send> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity {capacity} is not a power of two");
        Self {
            slots: (0..capacity).into_par_iter().map(|_| T::default()).collect(),
            mask: capacity - 1,
        }
    }
}

impl<T> Ring<T> {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, sequence: i32) -> &T {
        &self.slots[sequence as usize & self.mask]
    }

    pub fn slot_mut(&mut self, sequence: i32) -> &mut T {
        &mut self.slots[sequence as usize & self.mask]
    }
}

/// Append-only ring of entity states shared by every frame. A frame owns
/// the run `[parse_entities, parse_entities + num_entities)`.
#[derive(Debug, Clone)]
pub struct EntityPool {
    ring: Ring<EntityState>,
    head: i32,
    margin: usize,
}

impl EntityPool {
    pub fn new(capacity: usize, margin: usize) -> Self {
        Self {
            ring: Ring::new(capacity),
            head: 0,
            margin: margin.min(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    /// Index the next push will land on.
    pub fn head(&self) -> i32 {
        self.head
    }

    pub fn reset(&mut self) {
        self.head = 0;
    }

    /// Whether a frame whose run starts at `base` is too old to delta from.
    pub fn is_stale(&self, base: i32) -> bool {
        is_stale(self.head, base, self.capacity(), self.margin)
    }

    pub fn push(&mut self, state: EntityState) -> i32 {
        let index = self.head;
        *self.ring.slot_mut(index) = state;
        self.head = self.head.wrapping_add(1);
        index
    }

    /// Read a previously written entry. Reading a slot that was recycled or
    /// never written is a protocol error.
    pub fn get(&self, index: i32) -> ParseResult<&EntityState> {
        if !is_readable(self.head, index, self.capacity()) {
            return Err(ParseError::StalePoolRead {
                index,
                distance: pool_distance(self.head, index),
                capacity: self.capacity(),
            });
        }
        Ok(self.ring.slot(index))
    }

    /// The entities of a frame's run, in ascending entity number.
    pub fn run(&self, start: i32, count: i32) -> ParseResult<Vec<EntityState>> {
        (0..count)
            .map(|i| self.get(start.wrapping_add(i)).copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: i32) -> EntityState {
        EntityState { number: n, ..Default::default() }
    }

    #[test]
    fn test_is_stale_window() {
        // capacity 16, margin 4: up to 12 entries behind is fine
        assert!(!is_stale(12, 0, 16, 4));
        assert!(is_stale(13, 0, 16, 4));
        assert!(!is_stale(100, 100, 16, 4));
    }

    #[test]
    fn test_is_stale_across_wraparound() {
        let base = i32::MAX - 2;
        let head = base.wrapping_add(5);
        assert!(!is_stale(head, base, 16, 4));
        assert!(is_stale(head.wrapping_add(10), base, 16, 4));
    }

    #[test]
    fn test_is_readable_bounds() {
        assert!(!is_readable(5, 5, 8)); // not written yet
        assert!(is_readable(5, 4, 8));
        assert!(is_readable(9, 1, 8));
        assert!(!is_readable(9, 0, 8)); // recycled
    }

    #[test]
    #[should_panic]
    fn test_ring_rejects_odd_capacity() {
        let _ = Ring::<i32>::new(12);
    }

    #[test]
    fn test_ring_masks_sequence() {
        let mut ring = Ring::<i32>::new(4);
        *ring.slot_mut(6) = 42;
        assert_eq!(*ring.slot(2), 42);
        assert_eq!(ring.capacity(), 4);
    }

    #[test]
    fn test_pool_push_and_get() {
        let mut pool = EntityPool::new(8, 2);
        for n in 1..=3 {
            pool.push(numbered(n));
        }
        assert_eq!(pool.head(), 3);
        assert_eq!(pool.get(1).map(|s| s.number), Ok(2));
        let run = pool.run(0, 3).unwrap();
        assert_eq!(run.iter().map(|s| s.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pool_overwritten_read_is_fatal() {
        let mut pool = EntityPool::new(8, 2);
        for n in 0..10 {
            pool.push(numbered(n));
        }
        match pool.get(1) {
            Err(ParseError::StalePoolRead { index: 1, distance: 9, capacity: 8 }) => {}
            other => panic!("expected stale read, got {:?}", other),
        }
        assert!(pool.get(2).is_ok());
        assert!(pool.get(10).is_err());
    }

    #[test]
    fn test_pool_staleness_uses_margin() {
        let mut pool = EntityPool::new(8, 2);
        for n in 0..6 {
            pool.push(numbered(n));
        }
        assert!(!pool.is_stale(0));
        pool.push(numbered(6));
        assert!(pool.is_stale(0));
    }
}
