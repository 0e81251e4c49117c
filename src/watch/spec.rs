//! Watch specification tree.
//!
//! A [`WatchSpec`] mirrors (a subset of) the state shape: each entry pairs a
//! state key with a [`Watcher`] saying what to do there. The three watcher
//! shapes are an explicit enum (bare callback, callback with options, plain
//! nested spec), so the walk in [`super::WatchPlugin`] dispatches
//! exhaustively instead of probing shapes at runtime.

use std::fmt;
use std::rc::Rc;

use crate::observer::{OnCleanup, WatchHandler};
use crate::store::Store;
use crate::value::Value;

/// Wrap a closure as a [`WatchHandler`].
pub fn handler(f: impl Fn(&Value, &Value, &OnCleanup, &Store) + 'static) -> WatchHandler {
    Rc::new(f)
}

// =============================================================================
// Watcher
// =============================================================================

/// One node of a watch specification.
pub enum Watcher {
    /// Bare callback: observe this key with deep tracking unconditionally on.
    Callback(WatchHandler),

    /// Callback with options: explicit depth, and optionally a nested spec
    /// for watching specific children *in addition to* the whole subtree.
    WithOptions {
        handler: WatchHandler,
        /// `false` fires only when this exact key is reassigned; `true`
        /// (the default elsewhere) also fires on nested mutations.
        deep: bool,
        children: Option<WatchSpec>,
    },

    /// No observer at this level; recurse into the nested spec with this
    /// key's value as the new state root.
    Nested(WatchSpec),
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watcher::Callback(_) => f.write_str("Callback"),
            Watcher::WithOptions { deep, children, .. } => f
                .debug_struct("WithOptions")
                .field("deep", deep)
                .field("children", children)
                .finish_non_exhaustive(),
            Watcher::Nested(spec) => f.debug_tuple("Nested").field(spec).finish(),
        }
    }
}

// =============================================================================
// WatchSpec
// =============================================================================

/// Ordered key → [`Watcher`] map, mirroring a subset of the state shape.
#[derive(Default)]
pub struct WatchSpec {
    entries: Vec<(String, Watcher)>,
}

impl WatchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare-callback entry (deep tracking always on).
    pub fn on(
        self,
        key: impl Into<String>,
        f: impl Fn(&Value, &Value, &OnCleanup, &Store) + 'static,
    ) -> Self {
        self.entry(key, Watcher::Callback(Rc::new(f)))
    }

    /// Add a nested spec with no observer at this level.
    pub fn nest(self, key: impl Into<String>, children: WatchSpec) -> Self {
        self.entry(key, Watcher::Nested(children))
    }

    pub fn entry(mut self, key: impl Into<String>, watcher: Watcher) -> Self {
        self.entries.push((key.into(), watcher));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Watcher)> {
        self.entries.iter().map(|(k, w)| (k.as_str(), w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for WatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, w)| (k, w)))
            .finish()
    }
}
