//! # Event Bus
//!
//! The public surface: subscribe, publish, configure, tick, inspect.
//!
//! ## Lifecycle
//!
//! ```text
//! EventBus::new()            explicit handle, no hidden global
//!     │
//!     ├─ publish / subscribe    from any thread, lazily creates the type
//!     ├─ tick()                 once per frame, from the host's main loop
//!     │
//! shutdown()                 clears buffers, drops handlers, rejects new work
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::OverflowPolicy;
use crate::config::{BufferConfig, BusConfig};
use crate::dispatch::{Channel, Dispatcher};
use crate::error::BusResult;
use crate::event::Event;
use crate::listener::HandlerId;
use crate::liveness::{LifetimeWatch, Owner};
use crate::registry::{EventTypeId, TypeRegistry};

/// Opaque `(event type, handler id)` pair returned by a subscribe call.
///
/// The only valid key for [`EventBus::unsubscribe`].
pub struct SubscriptionToken<T> {
    event_type: EventTypeId,
    handler: HandlerId,
    _marker: PhantomData<fn(&T)>,
}

impl<T> SubscriptionToken<T> {
    /// The token returned for a rejected subscription.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            event_type: EventTypeId::INVALID,
            handler: HandlerId::INVALID,
            _marker: PhantomData,
        }
    }

    const fn new(event_type: EventTypeId, handler: HandlerId) -> Self {
        Self {
            event_type,
            handler,
            _marker: PhantomData,
        }
    }

    /// Checks if the subscription was accepted.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.event_type.is_valid() && self.handler.is_valid()
    }

    /// Returns the event type this token subscribes to.
    #[inline]
    #[must_use]
    pub const fn event_type(&self) -> EventTypeId {
        self.event_type
    }

    /// Returns the permanent handler id.
    #[inline]
    #[must_use]
    pub const fn handler_id(&self) -> HandlerId {
        self.handler
    }
}

impl<T> Clone for SubscriptionToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SubscriptionToken<T> {}

impl<T> PartialEq for SubscriptionToken<T> {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type && self.handler == other.handler
    }
}

impl<T> Eq for SubscriptionToken<T> {}

impl<T> Hash for SubscriptionToken<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_type.hash(state);
        self.handler.hash(state);
    }
}

impl<T> fmt::Debug for SubscriptionToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("event_type", &self.event_type.get())
            .field("handler", &self.handler.get())
            .finish()
    }
}

/// Read-only snapshot of bus activity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceStats {
    /// Events drained during the last tick.
    pub events_this_tick: usize,
    /// Events drained since the bus was created.
    pub total_events: u64,
    /// Exponentially smoothed tick duration (`avg * 0.9 + current * 0.1`).
    pub avg_processing_ms: f64,
    /// Event types with a buffer and registry.
    pub registered_types: usize,
    /// Live handlers across all types.
    pub total_listeners: usize,
    /// Sum of every ring buffer's current capacity.
    pub total_buffer_capacity: usize,
    /// Events rejected or evicted on overflow, across all types.
    pub dropped_events: u64,
    /// Handler invocations that panicked, across all types.
    pub handler_faults: u64,
    /// Completed ticks.
    pub tick_count: u64,
}

/// In-process, allocation-free publish/subscribe bus.
///
/// # Example
///
/// ```rust,ignore
/// let bus = EventBus::new();
///
/// let token = bus.subscribe(|hit: &AttackHit| println!("hit for {}", hit.damage));
///
/// // Any thread: copied into the type's ring buffer
/// bus.publish(AttackHit { damage: 50 });
///
/// // Main loop, once per frame
/// bus.tick();
///
/// bus.unsubscribe(token);
/// ```
pub struct EventBus {
    types: TypeRegistry,
    /// `TypeId -> Arc<Channel<T>>`.
    channels: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    dispatcher: Dispatcher,
    default_buffer: RwLock<BufferConfig>,
    shut_down: AtomicBool,
}

impl EventBus {
    /// Creates a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus from an explicit configuration.
    ///
    /// A zero default capacity is replaced by the built-in default; use
    /// [`BusConfig::validate`] to reject it instead.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        let default_buffer = if config.default_buffer.validate().is_ok() {
            config.default_buffer
        } else {
            tracing::warn!("zero default buffer capacity, using built-in default");
            BufferConfig {
                overflow_policy: config.default_buffer.overflow_policy,
                ..BufferConfig::default()
            }
        };

        Self {
            types: TypeRegistry::new(),
            channels: RwLock::new(HashMap::new()),
            dispatcher: Dispatcher::new(config.cleanup_interval_ticks),
            default_buffer: RwLock::new(default_buffer),
            shut_down: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes a handler with no owning context. It stays live until
    /// unsubscribed.
    pub fn subscribe<T, F>(&self, handler: F) -> SubscriptionToken<T>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_with_owner(Owner::Static, handler)
    }

    /// Subscribes a handler that stays live while the watched
    /// [`crate::Lifetime`] exists.
    pub fn subscribe_tracked<T, F>(&self, watch: LifetimeWatch, handler: F) -> SubscriptionToken<T>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_with_owner(Owner::Tracked(watch), handler)
    }

    /// Subscribes a handler on behalf of a shared object.
    ///
    /// The bus keeps only a weak reference; once the last `Arc` is dropped the
    /// handler is skipped and later pruned.
    pub fn subscribe_owned<T, O, F>(&self, owner: &Arc<O>, handler: F) -> SubscriptionToken<T>
    where
        T: Event,
        O: Any + Send + Sync,
        F: Fn(&O, &T) + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(owner);
        self.subscribe_with_owner(Owner::weak(owner), move |event: &T| {
            if let Some(owner) = weak.upgrade() {
                handler(&*owner, event);
            }
        })
    }

    /// Subscribes a handler with an explicit owner.
    ///
    /// Returns [`SubscriptionToken::invalid`] after [`EventBus::shutdown`].
    pub fn subscribe_with_owner<T, F>(&self, owner: Owner, handler: F) -> SubscriptionToken<T>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.is_shut_down() {
            return SubscriptionToken::invalid();
        }

        let Some((channel, _)) = self.channel_or_create::<T>(None) else {
            return SubscriptionToken::invalid();
        };
        let handler_id = channel.listeners.subscribe(owner, handler);
        if !handler_id.is_valid() {
            return SubscriptionToken::invalid();
        }
        SubscriptionToken::new(channel.id, handler_id)
    }

    /// Removes a subscription.
    ///
    /// No-op for invalid tokens and for tokens already unsubscribed.
    pub fn unsubscribe<T: Event>(&self, token: SubscriptionToken<T>) {
        if !token.is_valid() {
            return;
        }
        if let Some(channel) = self.channel::<T>() {
            if channel.id == token.event_type {
                channel.listeners.unsubscribe(token.handler);
            }
        }
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Copies `value` into the type's ring buffer for the next tick.
    ///
    /// Returns `false` if the buffer is full under `DropNewest`/`LogAndDrop`,
    /// or after shutdown.
    pub fn publish<T: Event>(&self, value: T) -> bool {
        if self.is_shut_down() {
            return false;
        }
        self.channel_or_create::<T>(None)
            .is_some_and(|(channel, _)| channel.buffer.try_enqueue(value))
    }

    /// Delivers `value` to every live handler before returning, bypassing
    /// the buffer.
    ///
    /// Returns the number of handlers that completed.
    pub fn publish_immediate<T: Event>(&self, value: T) -> usize {
        if self.is_shut_down() {
            return 0;
        }
        self.channel_or_create::<T>(None)
            .map_or(0, |(channel, _)| channel.listeners.notify_all(&value))
    }

    /// Drains every buffered event to its handlers.
    ///
    /// Call exactly once per frame from the host's driver loop. Returns the
    /// number of events processed.
    pub fn tick(&self) -> usize {
        if self.is_shut_down() {
            return 0;
        }
        self.dispatcher.tick()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Sets the buffer configuration used for event types created from now on.
    ///
    /// Existing buffers keep their size and policy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BusError::InvalidCapacity`] if `capacity` is zero.
    pub fn set_default_buffer_config(
        &self,
        capacity: usize,
        overflow_policy: OverflowPolicy,
    ) -> BusResult<()> {
        let config = BufferConfig::new(capacity, overflow_policy);
        config.validate()?;
        *self.default_buffer.write() = config;
        tracing::debug!(capacity, ?overflow_policy, "default buffer config changed");
        Ok(())
    }

    /// Creates the channel for `T` with its own buffer configuration.
    ///
    /// Returns `false` if `T` already has a buffer (its configuration is left
    /// unchanged) or the bus is shut down.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BusError::InvalidCapacity`] if `capacity` is zero.
    pub fn configure_type<T: Event>(&self, config: BufferConfig) -> BusResult<bool> {
        config.validate()?;
        if self.is_shut_down() || self.channel::<T>().is_some() {
            return Ok(false);
        }
        Ok(self
            .channel_or_create::<T>(Some(config))
            .is_some_and(|(_, created)| created))
    }

    /// Sets how often `tick` runs a liveness sweep. Zero disables it.
    pub fn set_cleanup_interval(&self, ticks: u32) {
        self.dispatcher.set_cleanup_interval(ticks);
    }

    /// Returns the configuration applied to newly created types.
    #[must_use]
    pub fn config(&self) -> BusConfig {
        BusConfig {
            default_buffer: *self.default_buffer.read(),
            cleanup_interval_ticks: self.dispatcher.cleanup_interval(),
        }
    }

    // =========================================================================
    // Maintenance & inspection
    // =========================================================================

    /// Returns the number of live handlers for `T`.
    #[must_use]
    pub fn listener_count<T: Event>(&self) -> usize {
        self.channel::<T>()
            .map_or(0, |channel| channel.listeners.listener_count())
    }

    /// Returns the number of buffered, undrained events of type `T`.
    #[must_use]
    pub fn pending_events<T: Event>(&self) -> usize {
        self.channel::<T>().map_or(0, |channel| channel.buffer.len())
    }

    /// Returns the current ring-buffer size for `T`, if it has one.
    #[must_use]
    pub fn buffer_capacity<T: Event>(&self) -> Option<usize> {
        self.channel::<T>().map(|channel| channel.buffer.capacity())
    }

    /// Returns the id of `T`, or [`EventTypeId::INVALID`] if never used.
    #[must_use]
    pub fn event_type_id<T: Event>(&self) -> EventTypeId {
        self.types.lookup::<T>().unwrap_or(EventTypeId::INVALID)
    }

    /// Drops every undrained event of type `T`.
    pub fn clear_event_buffer<T: Event>(&self) {
        if let Some(channel) = self.channel::<T>() {
            channel.buffer.clear();
        }
    }

    /// Empties every handler slot whose owner has died, across all types.
    ///
    /// Returns the number of slots emptied.
    pub fn cleanup_invalid_listeners(&self) -> usize {
        self.dispatcher.cleanup()
    }

    /// Returns a snapshot of the bus counters.
    #[must_use]
    pub fn performance_stats(&self) -> PerformanceStats {
        let dispatch = self.dispatcher.stats();
        PerformanceStats {
            events_this_tick: dispatch.events_this_tick,
            total_events: dispatch.total_events,
            avg_processing_ms: dispatch.avg_processing_ms,
            registered_types: self.dispatcher.channel_count(),
            total_listeners: self.dispatcher.total_listeners(),
            total_buffer_capacity: self.dispatcher.total_capacity(),
            dropped_events: self.dispatcher.total_dropped(),
            handler_faults: self.dispatcher.total_faults(),
            tick_count: dispatch.tick_count,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Tears the bus down.
    ///
    /// Drops every buffered event and every handler. Later publishes are
    /// rejected, subscribes return the invalid token and ticks do nothing.
    /// Idempotent.
    pub fn shutdown(&self) {
        {
            // Serialized with channel creation: no channel appears after close_all.
            let _channels = self.channels.write();
            if self.shut_down.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        self.dispatcher.close_all();
        tracing::debug!(types = self.types.len(), "event bus shut down");
    }

    /// Checks if [`EventBus::shutdown`] has been called.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    // =========================================================================
    // Channel lookup
    // =========================================================================

    fn channel<T: Event>(&self) -> Option<Arc<Channel<T>>> {
        let channels = self.channels.read();
        channels.get(&TypeId::of::<T>()).map(downcast_channel::<T>)
    }

    /// Returns the channel for `T` and whether this call created it.
    ///
    /// `config` overrides the default buffer configuration when this call
    /// is the one that creates the channel. Returns `None` once the bus is
    /// shut down and `T` has no channel yet.
    fn channel_or_create<T: Event>(
        &self,
        config: Option<BufferConfig>,
    ) -> Option<(Arc<Channel<T>>, bool)> {
        if let Some(channel) = self.channel::<T>() {
            return Some((channel, false));
        }

        let mut channels = self.channels.write();
        if let Some(existing) = channels.get(&TypeId::of::<T>()) {
            return Some((downcast_channel::<T>(existing), false));
        }
        if self.is_shut_down() {
            return None;
        }

        let id = self.types.get_or_register::<T>();
        let config = config.unwrap_or_else(|| *self.default_buffer.read());
        let channel = Arc::new(Channel::<T>::new(id, config));

        channels.insert(TypeId::of::<T>(), channel.clone());
        self.dispatcher.register(channel.clone());

        tracing::debug!(
            event_type = std::any::type_name::<T>(),
            id = id.get(),
            capacity = config.capacity,
            overflow_policy = ?config.overflow_policy,
            "created event channel"
        );
        Some((channel, true))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("registered_types", &self.dispatcher.channel_count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

fn downcast_channel<T: Event>(entry: &Arc<dyn Any + Send + Sync>) -> Arc<Channel<T>> {
    match Arc::clone(entry).downcast::<Channel<T>>() {
        Ok(channel) => channel,
        // The map is keyed by `TypeId::of::<T>()`.
        Err(_) => unreachable!("channel map entry does not match its TypeId"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Ping(u32);

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Pong(u32);

    #[test]
    fn test_lazy_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.event_type_id::<Ping>(), EventTypeId::INVALID);
        assert_eq!(bus.buffer_capacity::<Ping>(), None);

        assert!(bus.publish(Ping(1)));
        assert!(bus.event_type_id::<Ping>().is_valid());
        assert_eq!(bus.pending_events::<Ping>(), 1);
        assert_eq!(bus.performance_stats().registered_types, 1);
    }

    #[test]
    fn test_inspection_does_not_create() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count::<Ping>(), 0);
        assert_eq!(bus.pending_events::<Ping>(), 0);
        bus.clear_event_buffer::<Ping>();
        assert_eq!(bus.performance_stats().registered_types, 0);
    }

    #[test]
    fn test_token_carries_type_id() {
        let bus = EventBus::new();
        let ping = bus.subscribe(|_: &Ping| {});
        let pong = bus.subscribe(|_: &Pong| {});

        assert_eq!(ping.event_type(), bus.event_type_id::<Ping>());
        assert_eq!(pong.event_type(), bus.event_type_id::<Pong>());
        assert_ne!(ping.event_type(), pong.event_type());
    }

    #[test]
    fn test_invalid_token_unsubscribe_is_noop() {
        let bus = EventBus::new();
        let _ = bus.subscribe(|_: &Ping| {});
        bus.unsubscribe(SubscriptionToken::<Ping>::invalid());
        assert_eq!(bus.listener_count::<Ping>(), 1);
    }

    #[test]
    fn test_configure_type_only_before_creation() {
        let bus = EventBus::new();
        let custom = BufferConfig::new(4, OverflowPolicy::DropOldest);

        assert!(bus.configure_type::<Ping>(custom).unwrap());
        assert_eq!(bus.buffer_capacity::<Ping>(), Some(4));

        let other = BufferConfig::new(64, OverflowPolicy::Resize);
        assert!(!bus.configure_type::<Ping>(other).unwrap());
        assert_eq!(bus.buffer_capacity::<Ping>(), Some(4));

        assert!(bus.configure_type::<Pong>(BufferConfig::new(0, OverflowPolicy::Resize)).is_err());
    }

    #[test]
    fn test_zero_default_capacity_falls_back() {
        let bus = EventBus::with_config(BusConfig {
            default_buffer: BufferConfig::new(0, OverflowPolicy::Resize),
            cleanup_interval_ticks: 0,
        });
        assert!(bus.publish(Ping(0)));
        assert_eq!(bus.buffer_capacity::<Ping>(), Some(crate::DEFAULT_BUFFER_CAPACITY));
        assert_eq!(bus.config().default_buffer.overflow_policy, OverflowPolicy::Resize);
    }

    #[test]
    fn test_subscribe_owned() {
        struct Hud {
            seen: AtomicUsize,
        }

        let bus = EventBus::new();
        let hud = Arc::new(Hud {
            seen: AtomicUsize::new(0),
        });

        let _ = bus.subscribe_owned(&hud, |hud: &Hud, ping: &Ping| {
            hud.seen.fetch_add(ping.0 as usize, Ordering::Relaxed);
        });

        assert_eq!(bus.publish_immediate(Ping(3)), 1);
        assert_eq!(hud.seen.load(Ordering::Relaxed), 3);

        drop(hud);
        assert_eq!(bus.listener_count::<Ping>(), 0);
        assert_eq!(bus.publish_immediate(Ping(3)), 0);
        assert_eq!(bus.cleanup_invalid_listeners(), 1);
    }

    #[test]
    fn test_shutdown() {
        let bus = EventBus::new();
        let _ = bus.subscribe(|_: &Ping| {});
        assert!(bus.publish(Ping(1)));

        bus.shutdown();
        bus.shutdown();

        assert!(bus.is_shut_down());
        assert!(!bus.publish(Ping(2)));
        assert_eq!(bus.publish_immediate(Ping(3)), 0);
        assert_eq!(bus.tick(), 0);
        assert!(!bus.subscribe(|_: &Ping| {}).is_valid());
        assert_eq!(bus.listener_count::<Ping>(), 0);
        assert_eq!(bus.pending_events::<Ping>(), 0);
    }

    #[test]
    fn test_configure_type_reports_creation() {
        let bus = EventBus::new();
        let config = BufferConfig::new(8, OverflowPolicy::DropNewest);

        assert!(bus.publish(Pong(0)));
        assert!(bus.configure_type::<Ping>(config).unwrap());
        assert!(!bus.configure_type::<Pong>(config).unwrap());
        assert_eq!(bus.buffer_capacity::<Ping>(), Some(8));

        let (_, created) = bus.channel_or_create::<Ping>(None).unwrap();
        assert!(!created);
    }

    #[test]
    fn test_no_channel_created_after_shutdown() {
        let bus = EventBus::new();
        bus.shutdown();

        assert!(bus.channel_or_create::<Pong>(None).is_none());
        assert!(!bus.configure_type::<Pong>(BufferConfig::default()).unwrap());
        assert_eq!(bus.performance_stats().registered_types, 0);
        assert_eq!(bus.event_type_id::<Pong>(), EventTypeId::INVALID);
    }

    #[test]
    fn test_publish_through_channel_taken_before_shutdown() {
        let bus = EventBus::new();
        let (channel, created) = bus.channel_or_create::<Ping>(None).unwrap();
        assert!(created);

        bus.shutdown();

        assert!(!channel.buffer.try_enqueue(Ping(1)));
        assert!(!channel.listeners.subscribe(Owner::Static, |_| {}).is_valid());
        assert_eq!(bus.pending_events::<Ping>(), 0);
    }
}
