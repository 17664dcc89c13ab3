//! # Event Channels
//!
//! The buffer and listener registry of one event type, kept together.

use std::any::type_name;

use crate::buffer::EventBuffer;
use crate::config::BufferConfig;
use crate::event::Event;
use crate::listener::ListenerRegistry;
use crate::registry::EventTypeId;

/// Everything the bus keeps for one event type.
pub(crate) struct Channel<T> {
    pub(crate) id: EventTypeId,
    pub(crate) buffer: EventBuffer<T>,
    pub(crate) listeners: ListenerRegistry<T>,
}

impl<T: Event> Channel<T> {
    pub(crate) fn new(id: EventTypeId, config: BufferConfig) -> Self {
        Self {
            id,
            buffer: EventBuffer::new(config.capacity, config.overflow_policy),
            listeners: ListenerRegistry::new(),
        }
    }
}

/// Type-erased view of a [`Channel`] used by the dispatcher.
pub(crate) trait ErasedChannel: Send + Sync {
    /// Id of the channel's event type.
    fn event_type(&self) -> EventTypeId;
    /// Name of the channel's event type.
    fn type_name(&self) -> &'static str;
    /// Dequeues until empty, notifying listeners for each value.
    fn drain(&self) -> usize;
    /// Empties slots whose owner has died.
    fn prune_dead(&self) -> usize;
    /// Number of live handlers.
    fn listener_count(&self) -> usize;
    /// Current ring-buffer size.
    fn capacity(&self) -> usize;
    /// Values rejected or evicted on overflow.
    fn dropped_count(&self) -> u64;
    /// Handler invocations that panicked.
    fn fault_count(&self) -> u64;
    /// Drops unread values and closes the registry.
    fn close(&self);
}

impl<T: Event> ErasedChannel for Channel<T> {
    fn event_type(&self) -> EventTypeId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn drain(&self) -> usize {
        let mut processed = 0;
        while let Some(value) = self.buffer.try_dequeue() {
            self.listeners.notify_all(&value);
            processed += 1;
        }
        processed
    }

    fn prune_dead(&self) -> usize {
        self.listeners.prune_dead()
    }

    fn listener_count(&self) -> usize {
        self.listeners.listener_count()
    }

    fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn dropped_count(&self) -> u64 {
        self.buffer.dropped_count()
    }

    fn fault_count(&self) -> u64 {
        self.listeners.fault_count()
    }

    fn close(&self) {
        self.buffer.close();
        self.listeners.close();
    }
}
