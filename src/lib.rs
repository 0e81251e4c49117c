//! # statewatch
//!
//! Reactive state store with declarative nested watch trees.
//!
//! A store holds a dynamic state tree ([`Value`]). Consumers describe which
//! paths of that tree they care about with a [`WatchSpec`] - a tree that
//! mirrors (a subset of) the state shape, carrying a callback per watched
//! node - and the [`WatchPlugin`] walks both trees at store creation,
//! registering one observer per matched node.
//!
//! ## Architecture
//!
//! ```text
//! Registry (plugins) → Store (state tree) → WatchPlugin (spec × state walk)
//!                                         → observers on (map node, key)
//! Mutation (set / patch / reset) → trigger walk → tick queue → next_tick()
//! ```
//!
//! Observers bind to a state *node instance*, not a path string. Replacing a
//! subtree detaches every observer registered inside the old subtree: later
//! mutations walk from the root and can never reach it again. Triggered
//! observers are queued, not invoked; [`next_tick`] flushes the queue,
//! collapsing same-tick mutations into at most one invocation per observer,
//! and only when the observed value actually changed.
//!
//! ## Example
//!
//! ```ignore
//! use statewatch::{next_tick, Registry, StoreOptions, Value, WatchPlugin, WatchSpec};
//!
//! let registry = Registry::new().with_plugin(WatchPlugin);
//! let store = registry.create_store(
//!     StoreOptions::new("session", || {
//!         Value::object([("user", Value::object([("name", Value::from("ada"))]))])
//!     })
//!     .watch(WatchSpec::new().nest(
//!         "user",
//!         WatchSpec::new().on("name", |new, old, _cleanup, _store| {
//!             println!("name changed: {old:?} -> {new:?}");
//!         }),
//!     )),
//! )?;
//!
//! store.set(&["user", "name"], "grace")?;
//! next_tick(); // observers flush here, not at mutation time
//! ```
//!
//! ## Modules
//!
//! - [`value`] - Dynamic state tree (`Value`, shared map nodes)
//! - [`observer`] - Node-bound observers, trigger walk, cleanup registrar
//! - [`scheduler`] - Thread-local tick queue and flush
//! - [`store`] - Store handle, options, plugin registry
//! - [`watch`] - Watch specification tree and the watch plugin

pub mod observer;
pub mod scheduler;
pub mod store;
pub mod value;
pub mod watch;

// Re-export commonly used items
pub use observer::{OnCleanup, WatchHandler};
pub use scheduler::{has_pending, next_tick};
pub use store::{PatchScope, PluginContext, Registry, Store, StoreError, StoreOptions, StorePlugin};
pub use value::Value;
pub use watch::{WatchPlugin, WatchSpec, WatchedStore, Watcher};
