//! # Tick Dispatch
//!
//! Drains every event type's buffer into its listener registry, once per
//! externally driven tick.
//!
//! ```text
//! tick()
//!   │
//!   ├─ Channel<Spawned>   [v0 v1 v2] ──> notify_all(v0), notify_all(v1), ...
//!   ├─ Channel<Damage>    [        ] ──> (empty, skipped)
//!   └─ Channel<Despawned> [v0      ] ──> notify_all(v0)
//!
//!   order = order in which the types were first used
//! ```
//!
//! Each channel is generic over its event type and only erased behind
//! [`ErasedChannel`] at the per-type level, so the per-event drain loop is
//! monomorphized and no event value is ever boxed.

mod channel;
mod dispatcher;

pub(crate) use channel::{Channel, ErasedChannel};
pub(crate) use dispatcher::Dispatcher;
