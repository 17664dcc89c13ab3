//! # Dispatcher
//!
//! Owns the ordered channel list and the per-tick performance accounting.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use super::ErasedChannel;

/// Smoothing factor of the processing-time average.
const AVG_SMOOTHING: f64 = 0.1;

/// Counters updated once per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct DispatchStats {
    /// Events drained during the last tick.
    pub(crate) events_this_tick: usize,
    /// Events drained since creation.
    pub(crate) total_events: u64,
    /// Exponentially smoothed tick duration in milliseconds.
    pub(crate) avg_processing_ms: f64,
    /// Completed ticks.
    pub(crate) tick_count: u64,
}

impl DispatchStats {
    fn record(&mut self, processed: usize, elapsed_ms: f64) {
        self.events_this_tick = processed;
        self.total_events += processed as u64;
        self.avg_processing_ms =
            self.avg_processing_ms * (1.0 - AVG_SMOOTHING) + elapsed_ms * AVG_SMOOTHING;
        self.tick_count += 1;
    }
}

/// Drains every registered channel once per tick.
///
/// # Thread Safety
///
/// `tick` must be driven from one thread at a time. Channels may be
/// registered concurrently; the channel list lock is only held long enough to
/// clone the next `Arc`, so handlers are free to create new event types.
pub(crate) struct Dispatcher {
    /// Channels in event-type-id order.
    channels: RwLock<Vec<Arc<dyn ErasedChannel>>>,
    stats: Mutex<DispatchStats>,
    /// Liveness sweep period in ticks. Zero disables it.
    cleanup_interval_ticks: AtomicU32,
}

impl Dispatcher {
    pub(crate) fn new(cleanup_interval_ticks: u32) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            stats: Mutex::new(DispatchStats::default()),
            cleanup_interval_ticks: AtomicU32::new(cleanup_interval_ticks),
        }
    }

    /// Appends a freshly created channel.
    ///
    /// Callers register channels in id order.
    pub(crate) fn register(&self, channel: Arc<dyn ErasedChannel>) {
        let mut channels = self.channels.write();
        debug_assert_eq!(channel.event_type().get() as usize, channels.len() + 1);
        channels.push(channel);
    }

    /// Drains every channel, in registration order.
    ///
    /// Returns the number of events processed.
    pub(crate) fn tick(&self) -> usize {
        let start = Instant::now();
        let mut processed = 0;
        let mut index = 0;

        while let Some(channel) = self.channel_at(index) {
            processed += channel.drain();
            index += 1;
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let tick_count = {
            let mut stats = self.stats.lock();
            stats.record(processed, elapsed_ms);
            stats.tick_count
        };

        let interval = u64::from(self.cleanup_interval_ticks.load(Ordering::Relaxed));
        if interval > 0 && tick_count % interval == 0 {
            let pruned = self.cleanup();
            tracing::debug!(tick = tick_count, pruned, "periodic listener cleanup");
        }

        processed
    }

    /// Runs a liveness sweep over every channel.
    ///
    /// Returns the number of handler slots emptied.
    pub(crate) fn cleanup(&self) -> usize {
        let mut total = 0;
        let mut index = 0;

        while let Some(channel) = self.channel_at(index) {
            let pruned = channel.prune_dead();
            if pruned > 0 {
                tracing::warn!(
                    event_type = channel.type_name(),
                    id = channel.event_type().get(),
                    pruned,
                    "pruned listeners whose owner is gone"
                );
            }
            total += pruned;
            index += 1;
        }

        total
    }

    /// Clears every buffer and closes every registry.
    pub(crate) fn close_all(&self) {
        // Closing waits on in-flight notifications; do not hold the table meanwhile.
        let channels = self.channels.read().clone();
        for channel in &channels {
            channel.close();
        }
    }

    pub(crate) fn set_cleanup_interval(&self, ticks: u32) {
        self.cleanup_interval_ticks.store(ticks, Ordering::Relaxed);
    }

    pub(crate) fn cleanup_interval(&self) -> u32 {
        self.cleanup_interval_ticks.load(Ordering::Relaxed)
    }

    pub(crate) fn stats(&self) -> DispatchStats {
        *self.stats.lock()
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    pub(crate) fn total_listeners(&self) -> usize {
        self.channels.read().iter().map(|c| c.listener_count()).sum()
    }

    pub(crate) fn total_capacity(&self) -> usize {
        self.channels.read().iter().map(|c| c.capacity()).sum()
    }

    pub(crate) fn total_dropped(&self) -> u64 {
        self.channels.read().iter().map(|c| c.dropped_count()).sum()
    }

    pub(crate) fn total_faults(&self) -> u64 {
        self.channels.read().iter().map(|c| c.fault_count()).sum()
    }

    fn channel_at(&self, index: usize) -> Option<Arc<dyn ErasedChannel>> {
        self.channels.read().get(index).map(Arc::clone)
    }
}
