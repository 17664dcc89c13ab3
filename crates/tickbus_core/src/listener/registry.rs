//! # Listener Registry
//!
//! Thread-safe handler slots for one event type, with slot reuse, liveness
//! tracking and per-handler fault isolation.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::slot::{Handler, HandlerSlot};
use super::HandlerId;
use crate::event::Event;
use crate::liveness::Owner;

thread_local! {
    /// Registries this thread is currently inside `notify_all` of.
    static NOTIFYING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as notifying one registry until dropped.
struct NotifyScope {
    key: usize,
}

impl NotifyScope {
    fn enter(key: usize) -> Self {
        NOTIFYING.with(|stack| stack.borrow_mut().push(key));
        Self { key }
    }

    fn is_active(key: usize) -> bool {
        NOTIFYING.with(|stack| stack.borrow().contains(&key))
    }
}

impl Drop for NotifyScope {
    fn drop(&mut self) {
        NOTIFYING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|key| *key == self.key) {
                stack.remove(pos);
            }
        });
    }
}

/// Slot-table bookkeeping requested while the table was shared.
enum PendingOp {
    /// Vacate a slot that was already retired.
    Unsubscribe(HandlerId),
    Prune,
    Close,
}

/// Work queued by handlers of the registry that is notifying them.
///
/// Everything queued here is already in effect for delivery and counting;
/// only the slot-table rewrite waits for exclusive access.
struct Pending<T> {
    /// Subscriptions not yet placed in a slot.
    subscribes: Vec<HandlerSlot<T>>,
    ops: Vec<PendingOp>,
}

/// Slot table guarded by the registry lock.
struct Slots<T> {
    slots: Vec<HandlerSlot<T>>,
    /// Indices of vacant slots.
    free_list: Vec<usize>,
    /// Number of occupied slots (live, retired or not yet pruned).
    valid_count: usize,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            valid_count: 0,
        }
    }

    fn insert(&mut self, slot: HandlerSlot<T>) {
        match self.free_list.pop() {
            Some(index) => self.slots[index] = slot,
            None => self.slots.push(slot),
        }
        self.valid_count += 1;
    }

    fn remove(&mut self, id: HandlerId) -> bool {
        if !id.is_valid() {
            return false;
        }
        let Some(index) = self.slots.iter().position(|slot| slot.id == id) else {
            return false;
        };
        self.slots[index].vacate();
        self.free_list.push(index);
        self.valid_count -= 1;
        true
    }

    /// Vacates retired slots and slots whose owner died.
    ///
    /// Returns the number of dead-owner slots vacated.
    fn prune(&mut self) -> usize {
        let mut pruned = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_occupied() {
                continue;
            }
            let retired = slot.is_retired();
            let dead = !slot.owner.is_alive();
            if retired || dead {
                slot.vacate();
                self.free_list.push(index);
                if !retired {
                    pruned += 1;
                }
            }
        }
        self.valid_count = self.slots.iter().filter(|slot| slot.is_occupied()).count();
        pruned
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.valid_count = 0;
    }
}

/// Handler slots for events of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let registry: ListenerRegistry<Damage> = ListenerRegistry::new();
///
/// let id = registry.subscribe(Owner::Static, |d: &Damage| println!("{}", d.amount));
/// registry.notify_all(&Damage { amount: 10 });
/// registry.unsubscribe(id);
/// ```
///
/// # Reentrancy
///
/// A handler may subscribe, unsubscribe, prune or close the registry that is
/// notifying it. Subscribes and unsubscribes take effect before the call
/// returns, even while other threads are notifying; the slot table itself is
/// rewritten on the next exclusive pass.
pub struct ListenerRegistry<T> {
    slots: RwLock<Slots<T>>,
    pending: Mutex<Pending<T>>,
    has_pending: AtomicBool,
    closed: AtomicBool,
    /// Next handler id. Starts at 1, never reused.
    next_id: AtomicU64,
    /// Handler invocations that panicked.
    faults: AtomicU64,
}

impl<T: Event> ListenerRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots::new()),
            pending: Mutex::new(Pending {
                subscribes: Vec::new(),
                ops: Vec::new(),
            }),
            has_pending: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            faults: AtomicU64::new(0),
        }
    }

    /// Adds a handler and returns its permanent id.
    ///
    /// Returns [`HandlerId::INVALID`] if the registry has been closed.
    pub fn subscribe<F>(&self, owner: Owner, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return HandlerId::INVALID;
        }

        let id = HandlerId::new(self.next_id.fetch_add(1, Ordering::AcqRel));
        let handler: Handler<T> = Arc::new(handler);
        let slot = HandlerSlot::occupied(id, owner, handler);

        if NotifyScope::is_active(self.key()) {
            self.pending.lock().subscribes.push(slot);
            self.has_pending.store(true, Ordering::Release);
            return id;
        }

        let mut slots = self.slots.write();
        self.apply_pending_locked(&mut slots);
        if self.closed.load(Ordering::Acquire) {
            return HandlerId::INVALID;
        }
        slots.insert(slot);
        id
    }

    /// Empties the slot holding `id`.
    ///
    /// No-op if `id` does not name an occupied slot. The handler is never
    /// invoked again once this returns.
    pub fn unsubscribe(&self, id: HandlerId) {
        if !id.is_valid() {
            return;
        }

        if NotifyScope::is_active(self.key()) {
            self.retire(id);
            return;
        }

        let mut slots = self.slots.write();
        self.apply_pending_locked(&mut slots);
        slots.remove(id);
    }

    /// Invokes every live handler with `value`, in slot order, on this thread.
    ///
    /// Handlers whose owner has died are skipped but keep their slot until
    /// [`ListenerRegistry::prune_dead`] or an unsubscribe. A panicking
    /// handler is logged and counted; the remaining handlers still run.
    /// Handlers subscribed during this call first receive the next value.
    ///
    /// Returns the number of handlers that completed.
    pub fn notify_all(&self, value: &T) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }

        let key = self.key();
        let outermost = !NotifyScope::is_active(key);
        if outermost {
            self.try_apply_pending();
        }

        let watermark = self.next_id.load(Ordering::Acquire);
        let delivered = {
            let _scope = NotifyScope::enter(key);
            let slots = self.slots.read_recursive();
            let mut delivered = 0;

            for slot in &slots.slots {
                if self.closed.load(Ordering::Acquire) {
                    break;
                }
                if !slot.is_live() {
                    continue;
                }
                if let Some(handler) = slot.handler.as_ref() {
                    delivered += usize::from(self.invoke(slot.id, handler, value));
                }
            }

            if self.has_pending.load(Ordering::Acquire) {
                // Still holding the shared guard: queued work cannot move.
                delivered += self.notify_queued(watermark, value);
            }

            drop(slots);
            delivered
        };

        if outermost {
            self.try_apply_pending();
        }

        delivered
    }

    /// Empties every slot whose owner has died.
    ///
    /// Returns the number of slots emptied. Called from inside one of this
    /// registry's handlers, the sweep is queued and 0 is returned.
    pub fn prune_dead(&self) -> usize {
        if NotifyScope::is_active(self.key()) {
            self.defer(PendingOp::Prune);
            return 0;
        }

        let mut slots = self.slots.write();
        self.apply_pending_locked(&mut slots);
        slots.prune()
    }

    /// Empties every slot and rejects all later subscriptions.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);

        if NotifyScope::is_active(self.key()) {
            self.pending.lock().subscribes.clear();
            self.defer(PendingOp::Close);
            return;
        }

        let mut slots = self.slots.write();
        self.apply_pending_locked(&mut slots);
        slots.clear();
    }

    /// Returns the number of handlers whose owner is currently alive.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }

        let slots = self.slots.read_recursive();
        let placed = slots.slots.iter().filter(|slot| slot.is_live()).count();
        let queued = self
            .pending
            .lock()
            .subscribes
            .iter()
            .filter(|slot| slot.is_live())
            .count();
        placed + queued
    }

    /// Returns the number of occupied slots, dead owners and handlers not
    /// yet vacated included.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.slots.read_recursive().valid_count
    }

    /// Returns the number of handler invocations that panicked.
    #[inline]
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Checks if the registry has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Registry address, used to recognise reentrant calls.
    #[inline]
    fn key(&self) -> usize {
        (self as *const Self) as usize
    }

    fn invoke(&self, id: HandlerId, handler: &Handler<T>, value: &T) -> bool {
        match catch_unwind(AssertUnwindSafe(|| handler(value))) {
            Ok(()) => true,
            Err(payload) => {
                self.record_fault(id, payload.as_ref());
                false
            }
        }
    }

    /// Delivers to subscriptions issued before `watermark` that are still
    /// waiting for a slot.
    fn notify_queued(&self, watermark: u64, value: &T) -> usize {
        let queued: Vec<(HandlerId, Handler<T>)> = self
            .pending
            .lock()
            .subscribes
            .iter()
            .filter(|slot| slot.id.get() < watermark && slot.is_live())
            .filter_map(|slot| slot.handler.clone().map(|handler| (slot.id, handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in queued {
            // An earlier handler may have unsubscribed this one.
            let still_queued = self
                .pending
                .lock()
                .subscribes
                .iter()
                .any(|slot| slot.id == id && slot.is_live());
            if still_queued && self.invoke(id, &handler, value) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Unsubscribes from inside a notification of this registry.
    fn retire(&self, id: HandlerId) {
        // The caller already holds a shared guard, so this cannot wait on a writer.
        let placed = self
            .slots
            .read_recursive()
            .slots
            .iter()
            .find(|slot| slot.id == id)
            .map(HandlerSlot::retire)
            .is_some();

        if placed {
            self.defer(PendingOp::Unsubscribe(id));
        } else {
            self.pending.lock().subscribes.retain(|slot| slot.id != id);
        }
    }

    fn defer(&self, op: PendingOp) {
        self.pending.lock().ops.push(op);
        self.has_pending.store(true, Ordering::Release);
    }

    fn try_apply_pending(&self) {
        if !self.has_pending.load(Ordering::Acquire) {
            return;
        }
        // Contended: queued work is already visible, the rewrite can wait.
        if let Some(mut slots) = self.slots.try_write() {
            self.apply_pending_locked(&mut slots);
        }
    }

    fn apply_pending_locked(&self, slots: &mut Slots<T>) {
        if !self.has_pending.swap(false, Ordering::AcqRel) {
            return;
        }

        let (subscribes, ops) = {
            let mut pending = self.pending.lock();
            (
                std::mem::take(&mut pending.subscribes),
                std::mem::take(&mut pending.ops),
            )
        };

        for op in ops {
            match op {
                PendingOp::Unsubscribe(id) => {
                    slots.remove(id);
                }
                PendingOp::Prune => {
                    let pruned = slots.prune();
                    tracing::trace!(event_type = type_name::<T>(), pruned, "deferred prune applied");
                }
                PendingOp::Close => slots.clear(),
            }
        }

        if self.closed.load(Ordering::Acquire) {
            return;
        }
        for slot in subscribes {
            slots.insert(slot);
        }
    }

    fn record_fault(&self, id: HandlerId, payload: &(dyn Any + Send)) {
        self.faults.fetch_add(1, Ordering::Relaxed);

        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        tracing::error!(
            event_type = type_name::<T>(),
            handler_id = id.get(),
            panic = message,
            "event handler panicked; continuing delivery"
        );
    }
}

impl<T: Event> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
