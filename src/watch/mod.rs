//! Declarative watch trees.
//!
//! - [`WatchSpec`] / [`Watcher`] - the specification tree
//! - [`WatchPlugin`] - the store plugin that walks spec × state and
//!   registers observers
//! - [`WatchedStore`] - decorator exposing the resolved spec on a store

mod plugin;
mod spec;

pub use crate::observer::{OnCleanup, WatchHandler};
pub use plugin::{WatchPlugin, WatchedStore};
pub use spec::{WatchSpec, Watcher, handler};
