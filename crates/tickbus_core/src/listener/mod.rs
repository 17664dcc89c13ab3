//! # Listener Registries
//!
//! One registry of handler slots per event type.
//!
//! ## Locking
//!
//! ```text
//! notify_all ──────────> read lock   (many at once)
//! subscribe   ─┐
//! unsubscribe ─┼───────> write lock  (exclusive)
//! prune_dead  ─┘
//! ```
//!
//! A handler that mutates the registry currently notifying it on the same
//! thread cannot take the write lock. An unsubscribe retires its slot in
//! place and a subscribe waits in a queue that notifications also deliver
//! to, so both are in effect at once; the slot table is rewritten on the
//! next pass that gets the write lock.

mod registry;
mod slot;

pub use registry::ListenerRegistry;
pub use slot::HandlerId;
