//! Per-store configuration.

use std::rc::Rc;

use crate::value::Value;
use crate::watch::WatchSpec;

/// Options for [`super::Registry::create_store`]: an id, a state
/// initializer, and optionally a watch specification for the watch plugin.
///
/// The initializer is kept by the store and re-run on
/// [`super::Store::reset`], so it should build a fresh value each call.
pub struct StoreOptions {
    id: String,
    state: Rc<dyn Fn() -> Value>,
    watch: Option<Rc<WatchSpec>>,
}

impl StoreOptions {
    pub fn new(id: impl Into<String>, state: impl Fn() -> Value + 'static) -> Self {
        Self {
            id: id.into(),
            state: Rc::new(state),
            watch: None,
        }
    }

    /// Configure a watch specification. Accepts an owned spec or a shared
    /// `Rc` handle; the plugin exposes the same handle back on the store.
    pub fn watch(mut self, spec: impl Into<Rc<WatchSpec>>) -> Self {
        self.watch = Some(spec.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn watch_spec(&self) -> Option<&Rc<WatchSpec>> {
        self.watch.as_ref()
    }

    pub(crate) fn state_init(&self) -> Rc<dyn Fn() -> Value> {
        Rc::clone(&self.state)
    }
}
