//! Tick scheduler.
//!
//! Mutations never invoke observers synchronously: the trigger walk enqueues
//! pending entries here, and [`next_tick`] flushes them. This is the
//! equivalent of a microtask-aligned flush in a UI runtime - everything that
//! happens between two `next_tick` calls is "one tick" and collapses into at
//! most one invocation per observer.
//!
//! The queue is thread-local: the store is a single-threaded, `Rc`-based
//! structure, so there is never concurrent mutation to order against.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::observer::ObserverEntry;
use crate::value::{MapRef, Value};

pub(crate) struct Pending {
    pub entry: Rc<ObserverEntry>,
    /// Detached snapshot of the observed value, taken before the first
    /// mutation that triggered the entry this tick.
    pub old: Value,
    /// The map node the key held at snapshot time, for reassignment
    /// detection by node identity.
    pub old_handle: Option<MapRef>,
}

thread_local! {
    static QUEUE: RefCell<Vec<Pending>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn enqueue(pending: Pending) {
    QUEUE.with(|q| q.borrow_mut().push(pending));
}

/// True if any observer is waiting for the next flush.
pub fn has_pending() -> bool {
    QUEUE.with(|q| !q.borrow().is_empty())
}

/// Flush the tick queue.
///
/// Entries are processed in trigger order. Work enqueued by handlers during
/// the flush (a handler mutating the store) is drained in the same call, so
/// after `next_tick` returns the queue is empty.
pub fn next_tick() {
    loop {
        let batch: Vec<Pending> = QUEUE.with(|q| q.borrow_mut().drain(..).collect());
        if batch.is_empty() {
            break;
        }
        trace!(count = batch.len(), "flushing tick queue");
        for pending in batch {
            pending.entry.flush(pending.old, pending.old_handle);
        }
    }
}
