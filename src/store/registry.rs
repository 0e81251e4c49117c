//! Store registry and plugin hook.
//!
//! The registry is the store factory: it holds the installed plugins and
//! runs each one right after a store is built, handing it the store and the
//! options it was built from. That pair is the whole plugin contract.

use std::rc::Rc;

use tracing::debug;

use super::{Store, StoreError, StoreOptions};

/// Install-time context: the freshly built store and its options.
pub struct PluginContext<'a> {
    pub store: &'a Store,
    pub options: &'a StoreOptions,
}

/// A store plugin. Installed once per registry, invoked once per store.
pub trait StorePlugin {
    fn install(&self, ctx: &PluginContext<'_>);
}

/// Store factory holding the installed plugins.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Rc<dyn StorePlugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin(mut self, plugin: impl StorePlugin + 'static) -> Self {
        self.plugins.push(Rc::new(plugin));
        self
    }

    pub fn add_plugin(&mut self, plugin: impl StorePlugin + 'static) {
        self.plugins.push(Rc::new(plugin));
    }

    /// Build a store from `options` and run every installed plugin on it.
    pub fn create_store(&self, options: StoreOptions) -> Result<Store, StoreError> {
        let store = Store::new(&options)?;
        debug!(
            store = store.id(),
            plugins = self.plugins.len(),
            "store created"
        );
        for plugin in &self.plugins {
            plugin.install(&PluginContext {
                store: &store,
                options: &options,
            });
        }
        Ok(store)
    }
}
