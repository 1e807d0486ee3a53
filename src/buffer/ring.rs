use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Result, RunboardError};

/// Slot storage guarded by the buffer's mutex
struct Slots<T> {
    entries: Vec<T>,
    /// Next slot to write. Once the buffer is full this is also the oldest entry.
    cursor: usize,
}

/// Fixed-capacity ring buffer safe for concurrent appends and snapshots
///
/// Once `capacity` entries are held, every append overwrites the oldest one.
/// Each append and each snapshot holds the lock only for its own duration:
/// snapshots copy the entries out and release the lock before returning.
pub struct RingBuffer<T> {
    slots: Mutex<Slots<T>>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` entries
    ///
    /// A zero capacity is rejected with [`RunboardError::ZeroCapacity`].
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RunboardError::ZeroCapacity);
        }
        Ok(Self {
            slots: Mutex::new(Slots {
                entries: Vec::with_capacity(capacity),
                cursor: 0,
            }),
            capacity,
        })
    }

    /// Append an entry, evicting the oldest one when full
    pub fn append(&self, item: T) {
        let mut slots = self.lock();
        let cursor = slots.cursor;
        if slots.entries.len() < self.capacity {
            slots.entries.push(item);
        } else {
            slots.entries[cursor] = item;
        }
        slots.cursor = (cursor + 1) % self.capacity;
    }

    /// Copy out all held entries, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        let slots = self.lock();
        if slots.entries.len() < self.capacity {
            return slots.entries.clone();
        }

        let (newest, oldest) = slots.entries.split_at(slots.cursor);
        let mut ordered = Vec::with_capacity(self.capacity);
        ordered.extend_from_slice(oldest);
        ordered.extend_from_slice(newest);
        ordered
    }

    /// Drop every entry and rewind the cursor
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.entries.clear();
        slots.cursor = 0;
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if the buffer holds no entries
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Maximum number of entries kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave a slot half-written, so a
    // poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
