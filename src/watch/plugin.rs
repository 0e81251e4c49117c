//! Watch plugin: the spec × state tree walk.
//!
//! At install time the plugin pairs the configured [`WatchSpec`] with the
//! store's state tree and registers one observer per matched node. The walk
//! never fails: a spec entry whose state key is missing, whose value is
//! falsy, or whose shape does not match the state shape is skipped silently
//! (with a debug event), and the whole branch below it is skipped too. There
//! is no deferred re-check - the spec is resolved once, at store creation.

use std::ops::Deref;
use std::rc::Rc;

use tracing::debug;

use super::{WatchSpec, Watcher};
use crate::observer::{ObserverEntry, WatchHandler};
use crate::store::{PluginContext, Store, StorePlugin};
use crate::value::{MapRef, Value};

// =============================================================================
// WatchPlugin
// =============================================================================

/// Store plugin registering observers from the per-store watch spec.
pub struct WatchPlugin;

impl StorePlugin for WatchPlugin {
    fn install(&self, ctx: &PluginContext<'_>) {
        let Some(spec) = ctx.options.watch_spec() else {
            // No spec configured: leave the store untouched, no extension.
            return;
        };

        debug!(store = ctx.store.id(), entries = spec.len(), "installing watch spec");
        ctx.store.insert_extension(Rc::clone(spec));
        watch_state(&ctx.store.state_root(), spec, ctx.store);
    }
}

/// Recursive walk pairing a state node with a spec node.
fn watch_state(state: &MapRef, spec: &WatchSpec, store: &Store) {
    for (key, watcher) in spec.iter() {
        let value = state.borrow().get(key).cloned();
        let Some(value) = value else {
            debug!(key, "watch entry has no matching state key, skipping");
            continue;
        };
        if !value.is_truthy() {
            debug!(key, "state value is falsy, skipping watch entry");
            continue;
        }

        match watcher {
            Watcher::Callback(handler) => {
                observe(state, key, true, handler.clone(), store);
            }
            Watcher::WithOptions {
                handler,
                deep,
                children,
            } => {
                observe(state, key, *deep, handler.clone(), store);
                // Watch the whole subtree AND specific children separately.
                if let (Value::Map(child), Some(children)) = (&value, children) {
                    watch_state(child, children, store);
                }
            }
            Watcher::Nested(children) => match &value {
                Value::Map(child) => watch_state(child, children, store),
                _ => debug!(key, "nested watch entry on non-map value, skipping"),
            },
        }
    }
}

fn observe(parent: &MapRef, key: &str, deep: bool, handler: WatchHandler, store: &Store) {
    let entry = ObserverEntry::new(deep, handler, parent, key, store.downgrade());
    parent.borrow_mut().add_observer(key, entry);
}

// =============================================================================
// WatchedStore
// =============================================================================

/// Decorator composing a [`Store`] with read-only access to the resolved
/// watch spec. `Deref`s to the store, so the base API stays available.
pub struct WatchedStore {
    store: Store,
}

impl WatchedStore {
    /// The spec exactly as it was supplied at creation, or `None` when the
    /// store was created without one.
    pub fn watch_spec(&self) -> Option<Rc<WatchSpec>> {
        self.store.extension::<WatchSpec>()
    }

    pub fn into_inner(self) -> Store {
        self.store
    }
}

impl From<Store> for WatchedStore {
    fn from(store: Store) -> Self {
        Self { store }
    }
}

impl Deref for WatchedStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

// =============================================================================
// Tests
// =============================================================================
