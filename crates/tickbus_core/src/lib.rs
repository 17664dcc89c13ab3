//! # TICKBUS Core Engine
//!
//! Allocation-free publish/subscribe event bus designed for:
//! - Per-tick workloads (simulation loops, game servers)
//! - Publishing from any thread, dispatching from one
//! - Zero heap churn while events flow
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - Ring buffers are pre-allocated per type
//! 2. **No boxing, no reflection** - Events are plain `Copy` values; types get dense ids
//! 3. **No hidden threads** - The host calls [`EventBus::tick`] once per frame
//!
//! ## Example
//!
//! ```rust,ignore
//! use tickbus_core::{EventBus, OverflowPolicy};
//!
//! #[derive(Clone, Copy)]
//! struct BlockBroken { pos: [i32; 3] }
//!
//! let bus = EventBus::new();
//! bus.set_default_buffer_config(256, OverflowPolicy::DropOldest)?;
//!
//! let token = bus.subscribe(|e: &BlockBroken| spawn_particles(e.pos));
//! bus.publish(BlockBroken { pos: [1, 2, 3] });
//! bus.tick();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffer;
pub mod bus;
pub mod config;
mod dispatch;
pub mod error;
pub mod event;
pub mod listener;
pub mod liveness;
pub mod registry;

pub use buffer::{EventBuffer, OverflowPolicy};
pub use bus::{EventBus, PerformanceStats, SubscriptionToken};
pub use config::{BufferConfig, BusConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_CLEANUP_INTERVAL_TICKS};
pub use error::{BusError, BusResult};
pub use event::Event;
pub use listener::{HandlerId, ListenerRegistry};
pub use liveness::{Lifetime, LifetimeArena, LifetimeWatch, Owner};
pub use registry::{EventTypeId, TypeRegistry};
