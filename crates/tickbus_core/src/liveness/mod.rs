//! # Subscriber Liveness
//!
//! Answers "is the context that registered this handler still alive?"
//! without the bus holding a strong reference to that context.
//!
//! ## Generation-Tagged Lifetimes
//!
//! ```text
//! LifetimeArena (owned by the caller)
//! ┌──────┬──────┬──────┬──────┐
//! │ gen 3│ gen 0│ gen 7│ gen 1│   one counter per slot
//! └──┬───┴──────┴──────┴──────┘
//!    │
//!    ├── Lifetime { index 0, gen 3 }       held by the owning context
//!    └── LifetimeWatch { index 0, gen 3 }  captured by the handler slot
//!
//! drop(Lifetime) ──> gen 3 becomes 4 ──> every watch on (0, 3) is dead
//! ```
//!
//! Dropping the [`Lifetime`] is what kills its subscribers, so the owning
//! context's destructor carries the responsibility of invalidation.

mod arena;
mod owner;

pub use arena::{Lifetime, LifetimeArena, LifetimeWatch};
pub use owner::Owner;
