//! # Event Type Registry
//!
//! Assigns every distinct event type a dense integer id on first use.
//!
//! Ids are handed out in first-use order starting at 1; 0 is reserved for
//! "unregistered". The dispatcher drains types in id order, so the id also
//! fixes the per-tick drain order.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::event::Event;

/// Dense identifier for one event type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EventTypeId(u32);

impl EventTypeId {
    /// The unregistered/invalid id.
    pub const INVALID: Self = Self(0);

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Checks if this id was issued by a registry.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Zero-based position of this type in drain order.
    ///
    /// Only meaningful for valid ids.
    #[inline]
    pub(crate) const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl Default for EventTypeId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Thread-safe `TypeId -> EventTypeId` table.
///
/// # Thread Safety
///
/// Lookups of already-registered types only take the read lock. The first
/// registration of a type re-checks under the write lock, so two threads
/// racing on the same type always observe the same id.
pub struct TypeRegistry {
    ids: RwLock<HashMap<TypeId, EventTypeId>>,
    /// Type names indexed by `EventTypeId::index()`.
    names: RwLock<Vec<&'static str>>,
    next_id: AtomicU32,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(HashMap::new()),
            names: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Returns the id for `T`, registering it on first use.
    ///
    /// Idempotent: every call for the same `T` returns the same id.
    pub fn get_or_register<T: Event>(&self) -> EventTypeId {
        let key = TypeId::of::<T>();
        if let Some(id) = self.ids.read().get(&key) {
            return *id;
        }

        let mut ids = self.ids.write();
        if let Some(id) = ids.get(&key) {
            return *id;
        }

        let id = EventTypeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        ids.insert(key, id);
        self.names.write().push(type_name::<T>());

        tracing::debug!(event_type = type_name::<T>(), id = id.get(), "registered event type");
        id
    }

    /// Returns the id for `T` without registering it.
    #[must_use]
    pub fn lookup<T: Event>(&self) -> Option<EventTypeId> {
        self.ids.read().get(&TypeId::of::<T>()).copied()
    }

    /// Returns the type name recorded for `id`.
    #[must_use]
    pub fn name_of(&self, id: EventTypeId) -> Option<&'static str> {
        if !id.is_valid() {
            return None;
        }
        self.names.read().get(id.index()).copied()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Checks if no type has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
