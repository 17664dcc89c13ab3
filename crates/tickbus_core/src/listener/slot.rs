//! # Handler Slots
//!
//! Reusable storage cells. The slot index is recycled through a free list;
//! the [`HandlerId`] stored in it never is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::liveness::Owner;

/// Shared handler for events of type `T`.
pub(crate) type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Permanent identifier of one subscription within a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HandlerId(u64);

impl HandlerId {
    /// The rejected/invalid id.
    pub const INVALID: Self = Self(0);

    #[inline]
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Checks if this id was issued for an accepted subscription.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// One cell of a listener registry.
pub(crate) struct HandlerSlot<T> {
    pub(crate) handler: Option<Handler<T>>,
    pub(crate) owner: Owner,
    pub(crate) id: HandlerId,
    /// Unsubscribed under a shared lock; vacated on the next exclusive pass.
    retired: AtomicBool,
}

impl<T> HandlerSlot<T> {
    pub(crate) fn occupied(id: HandlerId, owner: Owner, handler: Handler<T>) -> Self {
        Self {
            handler: Some(handler),
            owner,
            id,
            retired: AtomicBool::new(false),
        }
    }

    /// Drops the handler and owner, leaving the slot reusable.
    pub(crate) fn vacate(&mut self) {
        self.handler = None;
        self.owner = Owner::Static;
        self.id = HandlerId::INVALID;
        *self.retired.get_mut() = false;
    }

    /// Stops delivery to this slot without needing exclusive access.
    #[inline]
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_occupied(&self) -> bool {
        self.handler.is_some()
    }

    /// Occupied, not retired, and its owner is still alive.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.is_occupied() && !self.is_retired() && self.owner.is_alive()
    }
}
