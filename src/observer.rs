//! Node-bound observers.
//!
//! An observer is registered on a `(map node, key)` pair and fires when the
//! value under that key changes. Binding to the node instance (not a path)
//! gives the detachment semantics the store relies on: when an ancestor is
//! reassigned, the old subtree's nodes become unreachable from the root, so
//! the trigger walk in [`trigger`] can never hit their observers again -
//! a later mutation of the *replacement* subtree does not fire an observer
//! that was registered on the overwritten one.
//!
//! Observers never fire synchronously. [`trigger`] snapshots the old value
//! and enqueues the entry on the tick queue; [`crate::scheduler::next_tick`]
//! flushes it, skipping entries whose value did not actually change.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::scheduler::{self, Pending};
use crate::store::{Store, WeakStore};
use crate::value::{MapNode, MapRef, Value};

/// Cleanup registered by a handler, run before its next invocation or on
/// observer teardown.
pub type CleanupFn = Box<dyn FnOnce()>;

/// Watch callback: `(new_value, old_value, cleanup_registrar, owning_store)`.
///
/// `new_value` is a live handle into the state tree; `old_value` is a
/// detached snapshot taken before the first mutation of the tick.
pub type WatchHandler = Rc<dyn Fn(&Value, &Value, &OnCleanup, &Store)>;

// =============================================================================
// Cleanup registrar
// =============================================================================

/// Passed to every handler invocation. Registering a cleanup schedules it to
/// run just before the observer next fires, or when the observer is torn
/// down. Registering again replaces an unconsumed cleanup.
pub struct OnCleanup {
    slot: Rc<RefCell<Option<CleanupFn>>>,
}

impl OnCleanup {
    pub fn register(&self, f: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(f));
    }
}

// =============================================================================
// ObserverEntry
// =============================================================================

/// One registered observer. Owned by the map node it watches; holds only
/// weak references back to the node and the store, so the state tree has no
/// ownership cycles.
pub struct ObserverEntry {
    deep: bool,
    handler: WatchHandler,
    cleanup: Rc<RefCell<Option<CleanupFn>>>,
    pending: Cell<bool>,
    /// Set while pending if the key itself was reassigned this tick; a
    /// reassigned map fires on node identity, not structural equality.
    force: Cell<bool>,
    parent: Weak<RefCell<MapNode>>,
    key: String,
    store: WeakStore,
}

impl ObserverEntry {
    pub(crate) fn new(
        deep: bool,
        handler: WatchHandler,
        parent: &MapRef,
        key: &str,
        store: WeakStore,
    ) -> Rc<Self> {
        Rc::new(Self {
            deep,
            handler,
            cleanup: Rc::new(RefCell::new(None)),
            pending: Cell::new(false),
            force: Cell::new(false),
            parent: Rc::downgrade(parent),
            key: key.to_string(),
            store,
        })
    }

    fn current_value(&self) -> Option<Value> {
        let parent = self.parent.upgrade()?;
        let value = parent.borrow().get(&self.key).cloned();
        value
    }

    fn run_cleanup(&self) {
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
    }

    /// Called by the scheduler for each pending entry. Invokes the handler
    /// at most once, and only when the observed value changed.
    ///
    /// "Changed" is structural, with one exception: a key reassigned this
    /// tick to a map node other than the one it held (`old_handle`) fires
    /// even when the contents compare equal - a replacement subtree is a
    /// new value to its observers. Reset reassignments and primitives stay
    /// on value comparison.
    pub(crate) fn flush(&self, old: Value, old_handle: Option<MapRef>) {
        self.pending.set(false);
        let force = self.force.replace(false);

        let Some(current) = self.current_value() else {
            return;
        };
        let replaced = force
            && match (&current, &old_handle) {
                (Value::Map(m), Some(h)) => !Rc::ptr_eq(m, h),
                (Value::Map(_), None) => true,
                _ => false,
            };
        if !replaced && current == old {
            trace!(key = %self.key, "observed value unchanged, skipping");
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };

        self.run_cleanup();
        let registrar = OnCleanup {
            slot: Rc::clone(&self.cleanup),
        };
        (self.handler)(&current, &old, &registrar, &store);
    }
}

impl Drop for ObserverEntry {
    fn drop(&mut self) {
        // Teardown: a cleanup registered by the last invocation still runs.
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
    }
}

// =============================================================================
// Trigger walk
// =============================================================================

/// How a mutation reaches the observers on a key.
#[derive(Clone, Copy, PartialEq)]
pub(crate) enum TriggerKind {
    /// Mutation somewhere below the key; reaches deep observers only.
    Ancestor,
    /// The key itself is being reassigned.
    Assign,
    /// Reset reassignment: reaches all observers, but fires on value
    /// change only.
    Reset,
}

/// Mark the observers on `(node, key)` pending for the next tick.
///
/// The old value is snapshotted here, before the mutation is applied,
/// together with the map node it held at the time; an entry already pending
/// keeps its earlier snapshot so that same-tick mutations collapse against
/// the value the tick started with. A later `Assign` still upgrades an
/// already-pending entry to fire-on-replacement.
pub(crate) fn trigger(node: &MapRef, key: &str, kind: TriggerKind) {
    let observers = node.borrow().observers_for(key);
    if observers.is_empty() {
        return;
    }

    let mut snapshot: Option<(Value, Option<MapRef>)> = None;
    for entry in observers {
        if kind == TriggerKind::Ancestor && !entry.deep {
            continue;
        }
        if entry.pending.replace(true) {
            if kind == TriggerKind::Assign {
                entry.force.set(true);
            }
            continue;
        }
        entry.force.set(kind == TriggerKind::Assign);
        let (old, old_handle) = snapshot
            .get_or_insert_with(|| {
                let current = node.borrow().get(key).cloned();
                let handle = current.as_ref().and_then(|v| v.as_map().cloned());
                let old = current.map(|v| v.snapshot()).unwrap_or(Value::Null);
                (old, handle)
            })
            .clone();
        scheduler::enqueue(Pending {
            entry,
            old,
            old_handle,
        });
    }
}
