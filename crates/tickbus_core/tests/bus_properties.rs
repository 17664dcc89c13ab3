//! Integration tests for buffered and immediate delivery semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tickbus_core::{BufferConfig, EventBus, LifetimeArena, OverflowPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Seq(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Other(u32);

/// Subscribes a recorder and returns the shared log.
fn record(bus: &EventBus) -> Arc<Mutex<Vec<u32>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let _ = bus.subscribe(move |e: &Seq| sink.lock().push(e.0));
    log
}

fn bus_with(capacity: usize, policy: OverflowPolicy) -> EventBus {
    let bus = EventBus::new();
    bus.set_default_buffer_config(capacity, policy).unwrap();
    bus
}

#[test]
fn test_fifo_without_overflow() {
    let bus = bus_with(256, OverflowPolicy::DropNewest);
    let log = record(&bus);

    for i in 0..200 {
        assert!(bus.publish(Seq(i)));
    }
    assert!(log.lock().is_empty());

    assert_eq!(bus.tick(), 200);
    assert_eq!(*log.lock(), (0..200).collect::<Vec<_>>());
}

#[test]
fn test_drop_newest() {
    let bus = bus_with(4, OverflowPolicy::DropNewest);
    let log = record(&bus);

    for i in 0..4 {
        assert!(bus.publish(Seq(i)));
    }
    assert!(!bus.publish(Seq(4)));

    bus.tick();
    assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
    assert_eq!(bus.performance_stats().dropped_events, 1);
}

#[test]
fn test_log_and_drop() {
    let bus = bus_with(4, OverflowPolicy::LogAndDrop);
    let log = record(&bus);

    let accepted: Vec<bool> = (0..5).map(|i| bus.publish(Seq(i))).collect();
    assert_eq!(accepted, vec![true, true, true, true, false]);

    bus.tick();
    assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn test_drop_oldest() {
    let bus = bus_with(4, OverflowPolicy::DropOldest);
    let log = record(&bus);

    for i in 0..5 {
        assert!(bus.publish(Seq(i)));
    }

    bus.tick();
    assert_eq!(*log.lock(), vec![1, 2, 3, 4]);
}

#[test]
fn test_resize() {
    let bus = bus_with(2, OverflowPolicy::Resize);
    let log = record(&bus);

    for i in 0..3 {
        assert!(bus.publish(Seq(i)));
    }
    assert_eq!(bus.buffer_capacity::<Seq>(), Some(4));

    bus.tick();
    assert_eq!(*log.lock(), vec![0, 1, 2]);
    assert_eq!(bus.performance_stats().dropped_events, 0);
}

#[test]
fn test_default_config_not_retroactive() {
    let bus = bus_with(4, OverflowPolicy::DropNewest);
    assert!(bus.publish(Seq(0)));

    bus.set_default_buffer_config(64, OverflowPolicy::Resize).unwrap();
    assert!(bus.publish(Other(0)));

    assert_eq!(bus.buffer_capacity::<Seq>(), Some(4));
    assert_eq!(bus.buffer_capacity::<Other>(), Some(64));
    assert_eq!(bus.performance_stats().total_buffer_capacity, 68);
}

#[test]
fn test_zero_capacity_rejected() {
    let bus = EventBus::new();
    assert!(bus.set_default_buffer_config(0, OverflowPolicy::DropNewest).is_err());
    assert_eq!(bus.config().default_buffer.capacity, tickbus_core::DEFAULT_BUFFER_CAPACITY);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let h = Arc::clone(&hits);
    let token = bus.subscribe(move |_: &Seq| {
        h.fetch_add(1, Ordering::Relaxed);
    });
    let _other = bus.subscribe(|_: &Seq| {});
    assert_eq!(bus.listener_count::<Seq>(), 2);

    bus.publish(Seq(0));
    bus.tick();
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    bus.unsubscribe(token);
    assert_eq!(bus.listener_count::<Seq>(), 1);

    bus.publish(Seq(1));
    bus.tick();
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let bus = EventBus::new();
    let token = bus.subscribe(|_: &Seq| {});
    let _keep = bus.subscribe(|_: &Seq| {});

    bus.unsubscribe(token);
    bus.unsubscribe(token);

    assert_eq!(bus.listener_count::<Seq>(), 1);
}

#[test]
fn test_dead_owner_skipped_then_pruned() {
    let bus = EventBus::new();
    let arena = LifetimeArena::new(8);
    let lifetime = arena.acquire().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let h = Arc::clone(&hits);
    let _ = bus.subscribe_tracked(lifetime.watch(), move |_: &Seq| {
        h.fetch_add(1, Ordering::Relaxed);
    });
    let _ = bus.subscribe(|_: &Seq| {});
    assert_eq!(bus.listener_count::<Seq>(), 2);

    drop(lifetime);

    // Skipped before any cleanup runs.
    assert_eq!(bus.publish_immediate(Seq(0)), 1);
    bus.publish(Seq(1));
    bus.tick();
    assert_eq!(hits.load(Ordering::Relaxed), 0);

    assert_eq!(bus.cleanup_invalid_listeners(), 1);
    assert_eq!(bus.listener_count::<Seq>(), 1);
    assert_eq!(bus.performance_stats().total_listeners, 1);
}

#[test]
fn test_publish_immediate_is_synchronous() {
    let bus = EventBus::new();
    let log = record(&bus);

    assert_eq!(bus.publish_immediate(Seq(9)), 1);
    assert_eq!(*log.lock(), vec![9]);
    assert_eq!(bus.pending_events::<Seq>(), 0);
    assert_eq!(bus.performance_stats().total_events, 0);
}

#[test]
fn test_immediate_bypasses_buffered() {
    let bus = EventBus::new();
    let log = record(&bus);

    bus.publish(Seq(1));
    bus.publish_immediate(Seq(2));
    bus.tick();

    assert_eq!(*log.lock(), vec![2, 1]);
}

#[test]
fn test_clear_event_buffer() {
    let bus = EventBus::new();
    let log = record(&bus);

    for i in 0..10 {
        bus.publish(Seq(i));
    }
    bus.clear_event_buffer::<Seq>();
    assert_eq!(bus.pending_events::<Seq>(), 0);

    assert_eq!(bus.tick(), 0);
    assert!(log.lock().is_empty());
}

#[test]
fn test_faulty_handler_does_not_block_others() {
    let bus = EventBus::new();
    let seq_hits = Arc::new(AtomicUsize::new(0));
    let other_hits = Arc::new(AtomicUsize::new(0));

    let _ = bus.subscribe(|e: &Seq| {
        if e.0 == 1 {
            panic!("bad event");
        }
    });
    let h = Arc::clone(&seq_hits);
    let _ = bus.subscribe(move |_: &Seq| {
        h.fetch_add(1, Ordering::Relaxed);
    });
    let h = Arc::clone(&other_hits);
    let _ = bus.subscribe(move |_: &Other| {
        h.fetch_add(1, Ordering::Relaxed);
    });

    for i in 0..3 {
        bus.publish(Seq(i));
    }
    bus.publish(Other(0));

    assert_eq!(bus.tick(), 4);
    assert_eq!(seq_hits.load(Ordering::Relaxed), 3);
    assert_eq!(other_hits.load(Ordering::Relaxed), 1);
    assert_eq!(bus.performance_stats().handler_faults, 1);
}

#[test]
fn test_handler_publishing_during_tick() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let inner = Arc::clone(&bus);
    let _ = bus.subscribe(move |e: &Seq| {
        let _ = inner.publish(Other(e.0 * 10));
    });
    let sink = Arc::clone(&log);
    let _ = bus.subscribe(move |e: &Other| sink.lock().push(e.0));

    bus.publish(Seq(1));
    bus.publish(Seq(2));

    // `Other` was registered after `Seq`, so it drains later in the same tick.
    assert_eq!(bus.tick(), 4);
    assert_eq!(*log.lock(), vec![10, 20]);
}

#[test]
fn test_handler_subscribing_during_immediate_publish() {
    let bus = Arc::new(EventBus::new());
    let late_hits = Arc::new(AtomicUsize::new(0));

    let inner = Arc::clone(&bus);
    let late = Arc::clone(&late_hits);
    let _ = bus.subscribe(move |e: &Seq| {
        if e.0 == 0 {
            let late = Arc::clone(&late);
            let token = inner.subscribe(move |_: &Seq| {
                late.fetch_add(1, Ordering::Relaxed);
            });
            assert!(token.is_valid());
        }
    });

    assert_eq!(bus.publish_immediate(Seq(0)), 1);
    assert_eq!(bus.listener_count::<Seq>(), 2);

    assert_eq!(bus.publish_immediate(Seq(1)), 2);
    assert_eq!(late_hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_per_type_configuration() {
    let bus = EventBus::new();
    assert!(bus
        .configure_type::<Seq>(BufferConfig::new(2, OverflowPolicy::DropOldest))
        .unwrap());
    let log = record(&bus);

    for i in 0..5 {
        assert!(bus.publish(Seq(i)));
    }
    bus.tick();
    assert_eq!(*log.lock(), vec![3, 4]);
}

#[test]
fn test_stats_snapshot() {
    let bus = EventBus::new();
    let _ = bus.subscribe(|_: &Seq| {});
    let _ = bus.subscribe(|_: &Other| {});

    for i in 0..5 {
        bus.publish(Seq(i));
    }
    bus.tick();
    bus.publish(Other(0));
    bus.tick();

    let stats = bus.performance_stats();
    assert_eq!(stats.events_this_tick, 1);
    assert_eq!(stats.total_events, 6);
    assert_eq!(stats.registered_types, 2);
    assert_eq!(stats.total_listeners, 2);
    assert_eq!(stats.tick_count, 2);
    assert!(stats.avg_processing_ms >= 0.0);
}
