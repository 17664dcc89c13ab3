//! # Lifetime Arena
//!
//! Fixed-size table of generation counters with a free list.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

struct ArenaSlots {
    /// One generation counter per slot.
    generations: Box<[AtomicU32]>,
    /// Free list - indices of available slots.
    free_list: Mutex<Vec<u32>>,
}

/// Caller-owned arena of generation-tagged lifetimes.
///
/// # Example
///
/// ```rust,ignore
/// let arena = LifetimeArena::new(1024);
///
/// let lifetime = arena.acquire()?;
/// bus.subscribe_tracked(lifetime.watch(), |hit: &AttackHit| { /* ... */ });
///
/// // Owner goes away: its handlers are skipped from now on.
/// drop(lifetime);
/// ```
#[derive(Clone)]
pub struct LifetimeArena {
    slots: Arc<ArenaSlots>,
}

impl LifetimeArena {
    /// Creates an arena with room for `capacity` simultaneous lifetimes.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or does not fit in `u32`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        let max = u32::try_from(capacity).expect("Capacity must fit in u32");

        let generations: Vec<AtomicU32> = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        let free_list: Vec<u32> = (0..max).rev().collect();

        Self {
            slots: Arc::new(ArenaSlots {
                generations: generations.into_boxed_slice(),
                free_list: Mutex::new(free_list),
            }),
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.generations.len()
    }

    /// Returns the number of lifetimes currently held.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.capacity() - self.slots.free_list.lock().len()
    }

    /// Takes a slot and returns the guard that keeps it alive.
    ///
    /// Returns `None` if every slot is in use.
    pub fn acquire(&self) -> Option<Lifetime> {
        let index = self.slots.free_list.lock().pop()?;
        let generation = self.slots.generations[index as usize].load(Ordering::Acquire);

        Some(Lifetime {
            slots: Arc::clone(&self.slots),
            index,
            generation,
        })
    }
}

impl fmt::Debug for LifetimeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeArena")
            .field("capacity", &self.capacity())
            .field("live", &self.live_count())
            .finish()
    }
}

/// Owning guard for one arena slot.
///
/// Dropping it advances the slot's generation, which invalidates every
/// [`LifetimeWatch`] taken from it, and returns the slot to the free list.
pub struct Lifetime {
    slots: Arc<ArenaSlots>,
    index: u32,
    generation: u32,
}

impl Lifetime {
    /// Returns a liveness handle that can be captured by handlers.
    #[must_use]
    pub fn watch(&self) -> LifetimeWatch {
        LifetimeWatch {
            slots: Arc::clone(&self.slots),
            index: self.index,
            generation: self.generation,
        }
    }

    /// Returns the arena slot index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation this lifetime was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.slots.generations[self.index as usize].fetch_add(1, Ordering::AcqRel);
        self.slots.free_list.lock().push(self.index);
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

/// `(index, generation)` handle into a [`LifetimeArena`].
///
/// Holds the arena, never the owning context.
#[derive(Clone)]
pub struct LifetimeWatch {
    slots: Arc<ArenaSlots>,
    index: u32,
    generation: u32,
}

impl LifetimeWatch {
    /// Checks if the watched lifetime has not been dropped.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.slots.generations[self.index as usize].load(Ordering::Acquire) == self.generation
    }
}

impl fmt::Debug for LifetimeWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeWatch")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("alive", &self.is_alive())
            .finish()
    }
}
