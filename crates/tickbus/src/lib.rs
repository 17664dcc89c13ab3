//! # TICKBUS
//!
//! Fixed-rate driver for the tick-driven event bus.
//!
//! ```text
//! ┌──────────────┐   publish    ┌──────────────────┐   tick()   ┌────────────┐
//! │  Producers   │ ───────────> │  EventBus        │ <───────── │  TickLoop  │
//! │  (any thread)│              │  (ring per type) │            │  (1 thread)│
//! └──────────────┘              └────────┬─────────┘            └────────────┘
//!                                        │ drain in type order
//!                                        v
//!                                 ┌─────────────┐
//!                                 │  Handlers   │
//!                                 └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - `tick_loop`: Tick pacing, stop signal and timing statistics

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod tick_loop;

/// Re-export of the core bus crate.
pub use tickbus_core as core;

pub use tick_loop::{StopHandle, TickLoop, TickLoopConfig, TickStats, TickStatsAccumulator};
pub use tickbus_core::{
    BufferConfig, BusConfig, BusError, BusResult, EventBus, OverflowPolicy, PerformanceStats,
    SubscriptionToken,
};
