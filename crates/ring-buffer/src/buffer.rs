//! Ring Buffer Implementation

use crate::RingBufferError;

/// Fixed-capacity ring buffer; pushing into a full buffer overwrites the oldest slot
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage
    storage: Box<[T]>,
    /// Index of the next slot to write
    head: usize,
    /// Number of live samples
    len: usize,
}

impl<T: Clone + Default> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        let storage: Vec<T> = (0..capacity).map(|_| T::default()).collect();
        Ok(Self {
            storage: storage.into_boxed_slice(),
            head: 0,
            len: 0,
        })
    }

    /// Push a sample, returning the evicted one when the buffer was full
    pub fn push(&mut self, value: T) -> Option<T> {
        let capacity = self.storage.len();
        let evicted = std::mem::replace(&mut self.storage[self.head], value);
        self.head = (self.head + 1) % capacity;

        if self.len == capacity {
            Some(evicted)
        } else {
            self.len += 1;
            None
        }
    }

    /// Clear the buffer without releasing storage
    pub fn clear(&mut self) {
        for slot in self.storage.iter_mut() {
            *slot = T::default();
        }
        self.head = 0;
        self.len = 0;
    }
}

impl<T> RingBuffer<T> {
    /// Get the number of samples currently in the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == self.storage.len()
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len as f64 / self.storage.len() as f64
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<&T> {
        self.iter_recent().next()
    }

    /// Iterate live samples, most recent first
    pub fn iter_recent(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.storage.len();
        (0..self.len).map(move |i| &self.storage[(self.head + capacity - 1 - i) % capacity])
    }

    /// Count live samples matching a predicate
    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.iter_recent().filter(|v| predicate(v)).count()
    }
}
