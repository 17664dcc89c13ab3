//! # Ring Buffer
//!
//! Fixed-capacity FIFO of event values for one event type.
//!
//! ## Thread Safety
//!
//! Any number of threads may publish; exactly one thread (the dispatcher)
//! drains. Writers are serialized by a `parking_lot::Mutex` around the ring
//! state, so reserving the write slot and filling it is one critical section.
//! The lock is never held while a handler runs.

use std::any::type_name;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::OverflowPolicy;
use crate::event::Event;

/// Cursor state guarded by the buffer lock.
struct Ring<T> {
    /// Backing storage. Allocated once; only `Resize` replaces it.
    slots: Vec<Option<T>>,
    /// Next slot to read.
    read: usize,
    /// Next slot to write.
    write: usize,
    /// Number of unread values.
    len: usize,
    /// Set once the owning bus shuts down; rejects every later write.
    closed: bool,
}

impl<T: Copy> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            read: 0,
            write: 0,
            len: 0,
            closed: false,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Writes at the write cursor. Caller guarantees the ring is not full.
    #[inline]
    fn push(&mut self, value: T) {
        debug_assert!(!self.is_full());
        self.slots[self.write] = Some(value);
        self.write = (self.write + 1) % self.capacity();
        self.len += 1;
    }

    #[inline]
    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.read].take();
        self.read = (self.read + 1) % self.capacity();
        self.len -= 1;
        value
    }

    /// Doubles the storage and moves unread values to the front, oldest first.
    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let mut slots = vec![None; old_capacity * 2];
        for (offset, slot) in slots.iter_mut().take(self.len).enumerate() {
            *slot = self.slots[(self.read + offset) % old_capacity];
        }
        self.slots = slots;
        self.read = 0;
        self.write = self.len;
    }

    fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }
}

/// Fixed-capacity circular buffer of `T` values.
///
/// # Example
///
/// ```rust,ignore
/// let buffer: EventBuffer<Damage> = EventBuffer::new(4, OverflowPolicy::DropOldest);
///
/// // O(1), no heap allocation
/// assert!(buffer.try_enqueue(Damage { amount: 10 }));
///
/// while let Some(damage) = buffer.try_dequeue() {
///     apply(damage);
/// }
/// ```
pub struct EventBuffer<T> {
    ring: Mutex<Ring<T>>,
    policy: OverflowPolicy,
    /// Values rejected or evicted because the buffer was full.
    dropped: AtomicU64,
}

impl<T: Event> EventBuffer<T> {
    /// Creates a buffer with pre-allocated storage for `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero. [`crate::BufferConfig::validate`] rejects
    /// zero before a buffer is ever built from configuration.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends a value, applying the overflow policy if the buffer is full.
    ///
    /// Returns `false` when the buffer is full and the policy is
    /// `DropNewest` or `LogAndDrop`, or after [`EventBuffer::close`].
    pub fn try_enqueue(&self, value: T) -> bool {
        let mut ring = self.ring.lock();

        if ring.closed {
            return false;
        }

        if ring.is_full() {
            match self.policy {
                OverflowPolicy::DropNewest => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                OverflowPolicy::LogAndDrop => {
                    let capacity = ring.capacity();
                    drop(ring);
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        event_type = type_name::<T>(),
                        capacity,
                        dropped_total = total,
                        "event buffer full, dropping event"
                    );
                    return false;
                }
                OverflowPolicy::DropOldest => {
                    let _ = ring.pop();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                OverflowPolicy::Resize => {
                    ring.grow();
                    tracing::debug!(
                        event_type = type_name::<T>(),
                        capacity = ring.capacity(),
                        "event buffer resized"
                    );
                }
            }
        }

        ring.push(value);
        true
    }

    /// Removes and returns the oldest unread value.
    #[inline]
    pub fn try_dequeue(&self) -> Option<T> {
        self.ring.lock().pop()
    }

    /// Drops every unread value. Capacity is kept.
    pub fn clear(&self) {
        self.ring.lock().clear();
    }

    /// Drops every unread value and rejects all later writes.
    pub fn close(&self) {
        let mut ring = self.ring.lock();
        ring.clear();
        ring.closed = true;
    }

    /// Returns the number of unread values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    /// Checks if there is nothing to read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current storage size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Returns the policy applied on overflow.
    #[inline]
    #[must_use]
    pub const fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Returns how many values were rejected or evicted since creation.
    #[inline]
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
