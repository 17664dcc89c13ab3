//! # TICKBUS Demo
//!
//! Several producer threads publish into one bus while the main thread drives
//! it at a fixed rate.
//!
//! ```bash
//! # Defaults
//! cargo run --bin tick_demo
//!
//! # With a bus configuration and verbose logs
//! RUST_LOG=tickbus_core=debug cargo run --bin tick_demo -- bus.toml
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tickbus::{BusConfig, BusResult, EventBus, TickLoop, TickLoopConfig};
use tracing_subscriber::EnvFilter;

/// Producer threads.
const PRODUCERS: u32 = 4;

/// Demo length in ticks (two seconds at 60 Hz).
const DEMO_TICKS: u64 = 120;

#[derive(Clone, Copy, Debug)]
struct DamageDealt {
    source: u32,
    amount: u32,
}

#[derive(Clone, Copy, Debug)]
struct BlockBroken {
    pos: [i32; 3],
}

fn main() -> BusResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bus_config = match std::env::args().nth(1) {
        Some(path) => BusConfig::from_file(path)?,
        None => BusConfig::default(),
    };
    let bus = Arc::new(EventBus::with_config(bus_config));

    let total_damage = Arc::new(AtomicU64::new(0));
    let blocks = Arc::new(AtomicU64::new(0));

    let damage = Arc::clone(&total_damage);
    let damage_token = bus.subscribe(move |e: &DamageDealt| {
        tracing::trace!(source = e.source, amount = e.amount, "damage dealt");
        damage.fetch_add(u64::from(e.amount), Ordering::Relaxed);
    });
    let counter = Arc::clone(&blocks);
    let _ = bus.subscribe(move |e: &BlockBroken| {
        if e.pos[1] < 0 {
            tracing::trace!(pos = ?e.pos, "block broken below sea level");
        }
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let running = Arc::new(AtomicBool::new(true));
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|source| {
            let bus = Arc::clone(&bus);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut published = 0u64;
                let mut i = 0i32;
                while running.load(Ordering::Relaxed) {
                    bus.publish(DamageDealt { source, amount: 3 });
                    bus.publish(BlockBroken { pos: [i, i % 64 - 32, -i] });
                    published += 2;
                    i = i.wrapping_add(1);
                    thread::sleep(Duration::from_micros(200));
                }
                published
            })
        })
        .collect();

    let config = TickLoopConfig {
        max_ticks: Some(DEMO_TICKS),
        enable_timing_logs: true,
        ..TickLoopConfig::default()
    };
    let mut driver = TickLoop::new(Arc::clone(&bus), config)?;
    driver.run();

    running.store(false, Ordering::Relaxed);
    let published: u64 = producers
        .into_iter()
        .map(|p| p.join().unwrap_or(0))
        .sum();

    // Catch whatever the producers left behind.
    driver.step();
    bus.unsubscribe(damage_token);

    driver.stats().print_summary();

    let stats = bus.performance_stats();
    println!();
    println!("┌─ BUS ────────────────────────────────────────────────────────────┐");
    println!("│ Published:          {published}");
    println!("│ Processed:          {}", stats.total_events);
    println!("│ Dropped:            {}", stats.dropped_events);
    println!("│ Event Types:        {}", stats.registered_types);
    println!("│ Listeners:          {}", stats.total_listeners);
    println!("│ Buffer Capacity:    {}", stats.total_buffer_capacity);
    println!("│ Avg Tick:           {:.3} ms", stats.avg_processing_ms);
    println!("│ Handler Faults:     {}", stats.handler_faults);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!(
        "damage total = {}, blocks broken = {}",
        total_damage.load(Ordering::Relaxed),
        blocks.load(Ordering::Relaxed)
    );

    bus.shutdown();
    Ok(())
}
