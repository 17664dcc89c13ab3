//! # Handler Owners
//!
//! The three ways a handler's owning context can be tracked.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use super::LifetimeWatch;

/// The owning context of a subscribed handler.
#[derive(Clone)]
pub enum Owner {
    /// No owning object. Always live.
    Static,
    /// Live while the watched [`super::Lifetime`] has not been dropped.
    Tracked(LifetimeWatch),
    /// Live while the owning `Arc` still has strong references.
    Weak(Weak<dyn Any + Send + Sync>),
}

impl Owner {
    /// Creates a weak owner from a shared object.
    #[must_use]
    pub fn weak<O: Any + Send + Sync>(owner: &Arc<O>) -> Self {
        let weak: Weak<O> = Arc::downgrade(owner);
        Self::Weak(weak)
    }

    /// Checks if the owning context still exists.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Static => true,
            Self::Tracked(watch) => watch.is_alive(),
            Self::Weak(weak) => weak.strong_count() > 0,
        }
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("Static"),
            Self::Tracked(watch) => f.debug_tuple("Tracked").field(watch).finish(),
            Self::Weak(weak) => f
                .debug_struct("Weak")
                .field("alive", &(weak.strong_count() > 0))
                .finish(),
        }
    }
}
