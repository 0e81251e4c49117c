//! Store: the owning handle around a state tree.
//!
//! A [`Store`] is a cheap-clone handle (`Rc` inside). All mutation goes
//! through it - [`Store::set`], [`Store::patch`], [`Store::patch_with`],
//! [`Store::reset`] - and every mutation walks the tree from the root,
//! triggering observers along the way (see [`crate::observer`]). Reads via
//! [`Store::get`] never trigger anything.
//!
//! Stores are created through a [`Registry`], which runs each installed
//! [`StorePlugin`] right after construction. Plugins attach capabilities
//! through the extensions typemap rather than by mutating the store type.

mod options;
mod registry;

pub use options::StoreOptions;
pub use registry::{PluginContext, Registry, StorePlugin};

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use thiserror::Error;
use tracing::debug;

use crate::observer::{self, TriggerKind};
use crate::value::{MapRef, Value};

// =============================================================================
// Errors
// =============================================================================

/// Errors from the store API itself. The watch plugin never raises any of
/// these: spec/state mismatches degrade to silent skips by contract.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state initializer for store `{0}` must produce a map")]
    StateNotMap(String),

    #[error("patch delta must be a map")]
    PatchNotMap,

    #[error("cannot assign through `{0}`: not a map")]
    NotAMap(String),

    #[error("no value at `{0}` on the assignment path")]
    MissingKey(String),

    #[error("assignment path is empty")]
    EmptyPath,
}

// =============================================================================
// Store
// =============================================================================

/// Cheap-clone handle to a store instance.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

struct StoreInner {
    id: String,
    root: MapRef,
    init: Rc<dyn Fn() -> Value>,
    extensions: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

/// Weak store handle held by observers, so the state tree does not keep its
/// own store alive.
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    pub(crate) fn new(options: &StoreOptions) -> Result<Self, StoreError> {
        let init = options.state_init();
        let root = match init() {
            Value::Map(root) => root,
            _ => return Err(StoreError::StateNotMap(options.id().to_string())),
        };
        Ok(Self {
            inner: Rc::new(StoreInner {
                id: options.id().to_string(),
                root,
                init,
                extensions: RefCell::new(HashMap::new()),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Live handle to the state root.
    pub fn state(&self) -> Value {
        Value::Map(Rc::clone(&self.inner.root))
    }

    pub(crate) fn state_root(&self) -> MapRef {
        Rc::clone(&self.inner.root)
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Rc::downgrade(&self.inner))
    }

    /// Read the value at `path`. `None` if any step is missing or a
    /// non-final step is not a map. Never triggers observers.
    pub fn get(&self, path: &[&str]) -> Option<Value> {
        let mut current = self.state();
        for key in path {
            let next = match &current {
                Value::Map(m) => m.borrow().get(key).cloned()?,
                _ => return None,
            };
            current = next;
        }
        Some(current)
    }

    /// Assign `value` at `path`. Equivalent to a direct property assignment:
    /// deep observers along the path and all observers on the final key are
    /// triggered for the next tick.
    pub fn set(&self, path: &[&str], value: impl Into<Value>) -> Result<(), StoreError> {
        self.assign(path, value.into())
    }

    fn assign(&self, path: &[&str], value: Value) -> Result<(), StoreError> {
        let (&last, ancestors) = path.split_last().ok_or(StoreError::EmptyPath)?;

        // Walk and validate before triggering or touching anything.
        let mut chain: Vec<(MapRef, &str)> = Vec::with_capacity(ancestors.len());
        let mut node = self.state_root();
        for &key in ancestors {
            let next = {
                let n = node.borrow();
                match n.get(key) {
                    Some(Value::Map(m)) => Rc::clone(m),
                    Some(_) => return Err(StoreError::NotAMap(key.to_string())),
                    None => return Err(StoreError::MissingKey(key.to_string())),
                }
            };
            chain.push((node, key));
            node = next;
        }

        for (n, k) in &chain {
            observer::trigger(n, k, TriggerKind::Ancestor);
        }
        observer::trigger(&node, last, TriggerKind::Assign);
        node.borrow_mut().insert(last, value);
        Ok(())
    }

    /// Bulk-patch by deep merge: where both the existing value and the delta
    /// value are maps the merge recurses, everything else is an assignment
    /// at that path. Each resulting assignment triggers exactly like
    /// [`Store::set`]; they all land in the same tick.
    pub fn patch(&self, delta: Value) -> Result<(), StoreError> {
        let Value::Map(delta) = delta else {
            return Err(StoreError::PatchNotMap);
        };
        let mut chain = Vec::new();
        let root = self.state_root();
        merge_into(&mut chain, &root, &delta);
        Ok(())
    }

    /// Bulk-patch callback form: `f` performs arbitrary mutations through
    /// the scope; they all collapse into the same tick.
    pub fn patch_with<F>(&self, f: F)
    where
        F: FnOnce(&PatchScope<'_>),
    {
        f(&PatchScope { store: self });
    }

    /// Re-run the state initializer and assign each top-level key.
    ///
    /// Only top-level keys are reassigned (not deep-merged), so observers
    /// registered inside replaced subtrees are detached rather than fired,
    /// and observers whose value is unchanged by the reset stay silent.
    pub fn reset(&self) -> Result<(), StoreError> {
        let fresh = (self.inner.init)();
        let Value::Map(fresh) = fresh else {
            return Err(StoreError::StateNotMap(self.id().to_string()));
        };
        let root = self.state_root();
        let entries = fresh.borrow().entries_vec();
        for (key, value) in entries {
            // Reset fires on actual value change only, so a reassignment
            // back to an identical initial value stays silent.
            observer::trigger(&root, &key, TriggerKind::Reset);
            root.borrow_mut().insert(&key, value);
        }
        debug!(store = self.id(), "state reset to initial");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Extensions
    // -------------------------------------------------------------------------

    /// Attach a capability to this store, keyed by type. Plugins use this
    /// instead of mutating the store type.
    pub fn insert_extension<T: 'static>(&self, extension: Rc<T>) {
        self.inner
            .extensions
            .borrow_mut()
            .insert(TypeId::of::<T>(), extension);
    }

    pub fn extension<T: 'static>(&self) -> Option<Rc<T>> {
        self.inner
            .extensions
            .borrow()
            .get(&TypeId::of::<T>())
            .cloned()?
            .downcast::<T>()
            .ok()
    }
}

fn merge_into(chain: &mut Vec<(MapRef, String)>, target: &MapRef, delta: &MapRef) {
    // Bind first: the delta may alias nodes already in the state tree.
    let entries = delta.borrow().entries_vec();
    for (key, delta_value) in entries {
        let existing = target.borrow().get(&key).cloned();
        match (existing, &delta_value) {
            (Some(Value::Map(target_child)), Value::Map(delta_child)) => {
                chain.push((Rc::clone(target), key));
                merge_into(chain, &target_child, delta_child);
                chain.pop();
            }
            _ => {
                for (n, k) in chain.iter() {
                    observer::trigger(n, k, TriggerKind::Ancestor);
                }
                observer::trigger(target, &key, TriggerKind::Assign);
                // Snapshot so the state never shares nodes with the caller's
                // delta value.
                target.borrow_mut().insert(&key, delta_value.snapshot());
            }
        }
    }
}

// =============================================================================
// PatchScope
// =============================================================================

/// Mutation scope handed to [`Store::patch_with`] callbacks.
pub struct PatchScope<'a> {
    store: &'a Store,
}

impl PatchScope<'_> {
    pub fn set(&self, path: &[&str], value: impl Into<Value>) -> Result<(), StoreError> {
        self.store.set(path, value)
    }

    pub fn get(&self, path: &[&str]) -> Option<Value> {
        self.store.get(path)
    }
}

// =============================================================================
// Tests
// =============================================================================
