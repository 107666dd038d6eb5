//! Growable circular buffer with FIFO order.
//!
//! Capacity doubles when the buffer fills. After a burst drains, capacity
//! halves once utilisation has stayed under a quarter for a full buffer's
//! worth of operations. A shrink leaves the buffer at most half full, so it
//! cannot be followed straight away by a grow.

use tracing::debug;

use crate::serial::SerialQueue;

pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// FIFO queue over a power-of-two ring of slots.
#[derive(Debug)]
pub struct ArrayQueue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
    /// Floor for shrinking, and the size `clear` returns to.
    initial_capacity: usize,
    /// Consecutive operations that ended below the low-water mark.
    low_water_ops: usize,
}

impl<T> ArrayQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// `initial_capacity` is rounded up to a power of two, at least 2.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(2).next_power_of_two();
        Self {
            slots: empty_slots(capacity),
            head: 0,
            len: 0,
            initial_capacity: capacity,
            low_water_ops: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn add(&mut self, value: T) {
        if self.len == self.capacity() {
            self.resize(self.capacity() * 2);
        }
        let tail = (self.head + self.len) & self.mask();
        self.slots[tail] = Some(value);
        self.len += 1;
        self.track_utilization();
    }

    pub fn poll(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) & self.mask();
        self.len -= 1;
        self.track_utilization();
        value
    }

    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mask = self.mask();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) & mask].as_ref())
    }

    pub fn clear(&mut self) {
        self.slots = empty_slots(self.initial_capacity);
        self.head = 0;
        self.len = 0;
        self.low_water_ops = 0;
    }

    fn mask(&self) -> usize {
        self.capacity() - 1
    }

    fn track_utilization(&mut self) {
        let capacity = self.capacity();
        if capacity <= self.initial_capacity || self.len * 4 >= capacity {
            self.low_water_ops = 0;
            return;
        }
        self.low_water_ops += 1;
        if self.low_water_ops >= capacity {
            self.resize(capacity / 2);
        }
    }

    /// Re-lay the live values contiguously from slot 0 in a ring of `capacity`.
    fn resize(&mut self, capacity: usize) {
        debug_assert!(capacity >= self.len && capacity.is_power_of_two());
        let old_capacity = self.capacity();
        let mask = self.mask();
        let mut slots = empty_slots(capacity);
        for (i, slot) in slots.iter_mut().take(self.len).enumerate() {
            *slot = self.slots[(self.head + i) & mask].take();
        }
        debug!(from = old_capacity, to = capacity, len = self.len, "array queue resized");
        self.slots = slots;
        self.head = 0;
        self.low_water_ops = 0;
    }
}

impl<T> Default for ArrayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_slots<T>(capacity: usize) -> Vec<Option<T>> {
    (0..capacity).map(|_| None).collect()
}

impl<T> SerialQueue<T> for ArrayQueue<T> {
    fn add(&mut self, value: T) -> bool {
        ArrayQueue::add(self, value);
        true
    }

    fn poll(&mut self) -> Option<T> {
        ArrayQueue::poll(self)
    }

    fn peek(&self) -> Option<&T> {
        ArrayQueue::peek(self)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    fn clear(&mut self) {
        ArrayQueue::clear(self)
    }

    fn internal_capacity(&self) -> usize {
        self.capacity()
    }
}
