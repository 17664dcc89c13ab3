//! # Tick Loop
//!
//! Drives [`EventBus::tick`] at a fixed rate from the calling thread.
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. WAIT                                                             │
//! │    └─ Block on the ticker or the stop channel, whichever fires      │
//! │                                                                     │
//! │ 2. DRAIN                                                            │
//! │    └─ bus.tick(): every type, in registration order                 │
//! │                                                                     │
//! │ 3. RECORD                                                           │
//! │    ├─ Tick duration and events processed                            │
//! │    └─ Warn if the tick overran its budget (timing logs only)        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tickbus_core::{BusError, BusResult, EventBus};

/// Default tick rate.
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Configuration for the tick loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickLoopConfig {
    /// Ticks per second.
    pub tick_rate_hz: u32,
    /// Stop after this many ticks. `None` runs until stopped.
    pub max_ticks: Option<u64>,
    /// Log ticks that overrun their budget.
    pub enable_timing_logs: bool,
}

impl Default for TickLoopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            max_ticks: None,
            enable_timing_logs: false,
        }
    }
}

impl TickLoopConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(text: &str) -> BusResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> BusResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidConfig`] if the tick rate is zero.
    pub fn validate(&self) -> BusResult<()> {
        if self.tick_rate_hz == 0 {
            return Err(BusError::InvalidConfig(
                "tick_rate_hz must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the time budget of one tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

/// Timing of a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Tick number, starting at 0.
    pub tick: u64,
    /// Time spent inside `bus.tick()` in microseconds.
    pub duration_us: u64,
    /// Events drained during the tick.
    pub events_processed: usize,
}

/// Cloneable handle that ends a running [`TickLoop::run`].
///
/// A stop requested while the loop is idle ends the next `run` immediately.
#[derive(Clone, Debug)]
pub struct StopHandle {
    sender: Sender<()>,
}

impl StopHandle {
    /// Asks the loop to return after the current tick.
    pub fn stop(&self) {
        // Full channel: a stop is already pending.
        let _ = self.sender.try_send(());
    }
}

/// Fixed-rate driver for an [`EventBus`].
///
/// # Example
///
/// ```rust,ignore
/// let bus = Arc::new(EventBus::new());
/// let mut driver = TickLoop::new(Arc::clone(&bus), TickLoopConfig::default())?;
///
/// let stop = driver.stop_handle();
/// std::thread::spawn(move || {
///     wait_for_shutdown_signal();
///     stop.stop();
/// });
///
/// driver.run();
/// driver.stats().print_summary();
/// ```
pub struct TickLoop {
    bus: Arc<EventBus>,
    config: TickLoopConfig,
    /// Ticks run since creation.
    tick_count: u64,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
    stats: TickStatsAccumulator,
}

impl TickLoop {
    /// Creates a loop around `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidConfig`] if the configuration is invalid.
    pub fn new(bus: Arc<EventBus>, config: TickLoopConfig) -> BusResult<Self> {
        config.validate()?;
        let (stop_tx, stop_rx) = bounded(1);

        Ok(Self {
            bus,
            config,
            tick_count: 0,
            stop_tx,
            stop_rx,
            stats: TickStatsAccumulator::new(config.tick_interval()),
        })
    }

    /// Returns a handle that can stop [`TickLoop::run`] from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            sender: self.stop_tx.clone(),
        }
    }

    /// Runs exactly one tick now, without pacing.
    pub fn step(&mut self) -> TickStats {
        let start = Instant::now();
        let events_processed = self.bus.tick();
        let elapsed = start.elapsed();

        let stats = TickStats {
            tick: self.tick_count,
            duration_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            events_processed,
        };
        self.tick_count += 1;
        self.stats.record(stats);

        if self.config.enable_timing_logs && elapsed > self.config.tick_interval() {
            tracing::warn!(
                tick = stats.tick,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.config.tick_interval().as_secs_f64() * 1000.0,
                events = events_processed,
                "tick exceeded budget"
            );
        }

        stats
    }

    /// Ticks at the configured rate until stopped, `max_ticks` is reached
    /// or the bus is shut down.
    ///
    /// Returns the number of ticks run by this call.
    pub fn run(&mut self) -> u64 {
        let ticker = crossbeam_channel::tick(self.config.tick_interval());
        let mut ran = 0;

        tracing::debug!(rate_hz = self.config.tick_rate_hz, max_ticks = ?self.config.max_ticks, "tick loop started");

        loop {
            if self.limit_reached() || self.bus.is_shut_down() {
                break;
            }
            if self.stop_rx.try_recv().is_ok() {
                break;
            }

            select! {
                recv(self.stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    self.step();
                    ran += 1;
                }
            }
        }

        tracing::debug!(ran, total = self.tick_count, "tick loop stopped");
        ran
    }

    /// Returns the number of ticks run since creation.
    #[inline]
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the accumulated tick statistics.
    #[must_use]
    pub fn stats(&self) -> &TickStatsAccumulator {
        &self.stats
    }

    /// Returns the driven bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &TickLoopConfig {
        &self.config
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_ticks
            .is_some_and(|max| self.tick_count >= max)
    }
}

/// Accumulator for tick statistics.
#[derive(Clone, Debug)]
pub struct TickStatsAccumulator {
    /// Total ticks recorded.
    pub ticks_recorded: u64,
    /// Sum of tick durations.
    pub total_us_sum: u64,
    /// Shortest tick.
    pub min_tick_us: u64,
    /// Longest tick.
    pub max_tick_us: u64,
    /// Events drained across all recorded ticks.
    pub events_sum: u64,
    /// Ticks that took longer than their budget.
    pub ticks_over_budget: u64,
    /// Per-tick budget.
    pub budget_us: u64,
}

impl TickStatsAccumulator {
    /// Creates an accumulator with the given per-tick budget.
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            ticks_recorded: 0,
            total_us_sum: 0,
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            events_sum: 0,
            ticks_over_budget: 0,
            budget_us: u64::try_from(budget.as_micros()).unwrap_or(u64::MAX),
        }
    }

    /// Records a tick's statistics.
    pub fn record(&mut self, stats: TickStats) {
        self.ticks_recorded += 1;
        self.total_us_sum += stats.duration_us;
        self.min_tick_us = self.min_tick_us.min(stats.duration_us);
        self.max_tick_us = self.max_tick_us.max(stats.duration_us);
        self.events_sum += stats.events_processed as u64;

        if stats.duration_us > self.budget_us {
            self.ticks_over_budget += 1;
        }
    }

    /// Returns average tick time in milliseconds.
    #[must_use]
    pub fn avg_tick_ms(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.ticks_recorded as f64) / 1000.0
    }

    /// Returns the average number of events drained per tick.
    #[must_use]
    pub fn avg_events_per_tick(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        self.events_sum as f64 / self.ticks_recorded as f64
    }

    /// Returns the fraction of ticks over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        self.ticks_over_budget as f64 / self.ticks_recorded as f64
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        let min_ms = if self.ticks_recorded == 0 {
            0.0
        } else {
            self.min_tick_us as f64 / 1000.0
        };

        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                     TICK STATISTICS SUMMARY                      ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();
        println!("┌─ TIMING ─────────────────────────────────────────────────────────┐");
        println!("│ Ticks Recorded:     {}", self.ticks_recorded);
        println!("│ Average Tick:       {:.3} ms", self.avg_tick_ms());
        println!("│ Min Tick:           {min_ms:.3} ms");
        println!("│ Max Tick:           {:.3} ms", self.max_tick_us as f64 / 1000.0);
        println!("│ Events / Tick:      {:.1}", self.avg_events_per_tick());
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
        println!("┌─ BUDGET ─────────────────────────────────────────────────────────┐");
        println!("│ Target:             {:.3} ms", self.budget_us as f64 / 1000.0);
        println!(
            "│ Over Budget:        {} ticks ({:.1}%)",
            self.ticks_over_budget,
            self.over_budget_ratio() * 100.0
        );
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
}

impl Default for TickStatsAccumulator {
    fn default() -> Self {
        Self::new(TickLoopConfig::default().tick_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Clone, Copy)]
    struct Ping;

    fn fast_config(max_ticks: Option<u64>) -> TickLoopConfig {
        TickLoopConfig {
            tick_rate_hz: 1000,
            max_ticks,
            enable_timing_logs: false,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = TickLoopConfig::default();
        assert_eq!(config.tick_rate_hz, 60);
        assert_eq!(config.max_ticks, None);
        assert_eq!(config.tick_interval(), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn test_config_from_toml() {
        let config = TickLoopConfig::from_toml_str(
            r"
            tick_rate_hz = 30
            max_ticks = 90
            ",
        )
        .unwrap();

        assert_eq!(config.tick_rate_hz, 30);
        assert_eq!(config.max_ticks, Some(90));
        assert!(!config.enable_timing_logs);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let err = TickLoopConfig::from_toml_str("tick_rate_hz = 0").unwrap_err();
        assert!(matches!(err, BusError::InvalidConfig(_)));

        let bad = TickLoopConfig {
            tick_rate_hz: 0,
            ..TickLoopConfig::default()
        };
        assert!(TickLoop::new(Arc::new(EventBus::new()), bad).is_err());
    }

    #[test]
    fn test_step_drains_bus() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _ = bus.subscribe(move |_: &Ping| {
            h.fetch_add(1, Ordering::Relaxed);
        });

        let mut driver = TickLoop::new(Arc::clone(&bus), TickLoopConfig::default()).unwrap();
        bus.publish(Ping);
        bus.publish(Ping);

        let stats = driver.step();
        assert_eq!(stats.tick, 0);
        assert_eq!(stats.events_processed, 2);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
        assert_eq!(driver.tick_count(), 1);
        assert_eq!(driver.stats().events_sum, 2);
    }

    #[test]
    fn test_run_honors_max_ticks() {
        let bus = Arc::new(EventBus::new());
        let mut driver = TickLoop::new(Arc::clone(&bus), fast_config(Some(5))).unwrap();

        assert_eq!(driver.run(), 5);
        assert_eq!(driver.tick_count(), 5);
        assert_eq!(bus.performance_stats().tick_count, 5);

        // Limit already reached.
        assert_eq!(driver.run(), 0);
    }

    #[test]
    fn test_stop_handle_ends_run() {
        let bus = Arc::new(EventBus::new());
        let mut driver = TickLoop::new(bus, fast_config(None)).unwrap();
        let stop = driver.stop_handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stop.stop();
            stop.stop();
        });

        driver.run();
        stopper.join().unwrap();
        assert!(driver.tick_count() > 0);
    }

    #[test]
    fn test_stop_before_run() {
        let bus = Arc::new(EventBus::new());
        let mut driver = TickLoop::new(bus, fast_config(None)).unwrap();
        driver.stop_handle().stop();

        assert_eq!(driver.run(), 0);
    }

    #[test]
    fn test_run_ends_on_shutdown() {
        let bus = Arc::new(EventBus::new());
        let mut driver = TickLoop::new(Arc::clone(&bus), fast_config(None)).unwrap();
        bus.shutdown();

        assert_eq!(driver.run(), 0);
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = TickStatsAccumulator::new(Duration::from_millis(1));

        for i in 0..10 {
            acc.record(TickStats {
                tick: i,
                duration_us: if i % 5 == 0 { 2_000 } else { 500 },
                events_processed: 4,
            });
        }

        assert_eq!(acc.ticks_recorded, 10);
        assert_eq!(acc.ticks_over_budget, 2);
        assert_eq!(acc.min_tick_us, 500);
        assert_eq!(acc.max_tick_us, 2_000);
        assert!((acc.avg_tick_ms() - 0.8).abs() < 1e-9);
        assert!((acc.avg_events_per_tick() - 4.0).abs() < 1e-9);
        assert!((acc.over_budget_ratio() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = TickStatsAccumulator::default();
        assert_eq!(acc.avg_tick_ms(), 0.0);
        assert_eq!(acc.over_budget_ratio(), 0.0);
    }
}
