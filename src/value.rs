//! Dynamic state tree.
//!
//! State is a tree of [`Value`]s. Map nodes are shared (`Rc<RefCell<_>>`) so
//! that observers bind to a node *instance* rather than a path string; see
//! [`crate::observer`] for why that distinction matters when a subtree is
//! replaced.
//!
//! Truthiness follows the conventions of loosely-typed state trees: `Null`,
//! `false`, `0`, `0.0`, `NaN` and `""` are falsy; maps are always truthy.
//! Equality is structural across the whole tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::observer::ObserverEntry;

/// Shared handle to a map node in the state tree.
pub type MapRef = Rc<RefCell<MapNode>>;

// =============================================================================
// Value
// =============================================================================

/// A node in the state tree.
///
/// `Clone` is shallow: cloning a `Map` clones the handle, not the node. Use
/// [`Value::snapshot`] for a detached deep copy.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(MapRef),
}

impl Value {
    /// Build a fresh map value from key/value pairs.
    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let node = MapNode::new();
        let handle = Rc::new(RefCell::new(node));
        {
            let mut n = handle.borrow_mut();
            for (key, value) in entries {
                n.entries.insert(key.into(), value);
            }
        }
        Value::Map(handle)
    }

    /// Falsy values (and only falsy values) are skipped by the watch-tree
    /// walk at registration time.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Map(_) => true,
        }
    }

    /// Detached deep copy. The result shares no nodes with the source and
    /// carries no observers, so later mutations of the live tree cannot
    /// reach it. Used for old-value snapshots.
    pub fn snapshot(&self) -> Value {
        match self {
            Value::Map(m) => {
                let node = m.borrow();
                Value::object(node.entries.iter().map(|(k, v)| (k.clone(), v.snapshot())))
            }
            other => other.clone(),
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.entries.len() == b.entries.len()
                    && a.entries
                        .iter()
                        .all(|(k, v)| b.entries.get(k).is_some_and(|w| v == w))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => fmt::Debug::fmt(b, f),
            Value::Int(i) => fmt::Debug::fmt(i, f),
            Value::Float(x) => fmt::Debug::fmt(x, f),
            Value::Str(s) => fmt::Debug::fmt(s, f),
            Value::Map(m) => f.debug_map().entries(m.borrow().entries.iter()).finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

// =============================================================================
// MapNode
// =============================================================================

/// A map node: entries plus the observers registered on its keys.
///
/// Observers live on the node they watch, mirroring a per-property dependency
/// list. When the node is dropped (detached subtree going away, store
/// teardown), its observers drop with it and their pending cleanups run.
pub struct MapNode {
    entries: HashMap<String, Value>,
    observers: HashMap<String, Vec<Rc<ObserverEntry>>>,
}

impl MapNode {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            observers: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    /// Cheap (handle-level) copy of the entries, for iteration that must not
    /// hold a borrow while the tree is being mutated.
    pub(crate) fn entries_vec(&self) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn add_observer(&mut self, key: &str, entry: Rc<ObserverEntry>) {
        self.observers.entry(key.to_string()).or_default().push(entry);
    }

    pub(crate) fn observers_for(&self, key: &str) -> Vec<Rc<ObserverEntry>> {
        self.observers.get(key).cloned().unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());

        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::object([("k", Value::Null)]).is_truthy());
    }

    #[test]
    fn test_structural_equality_across_distinct_nodes() {
        let a = Value::object([("x", Value::object([("y", Value::from(1))]))]);
        let b = Value::object([("x", Value::object([("y", Value::from(1))]))]);
        let c = Value::object([("x", Value::object([("y", Value::from(2))]))]);

        assert_eq!(a, b, "distinct nodes with equal contents compare equal");
        assert_ne!(a, c);
        assert_ne!(a, Value::object([("x", Value::from(1))]));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let live = Value::object([("n", Value::from(1))]);
        let snap = live.snapshot();
        assert_eq!(live, snap);

        let node = live.as_map().unwrap();
        node.borrow_mut().insert("n", Value::from(2));

        assert_ne!(live, snap, "mutating the live tree must not reach the snapshot");
        assert_eq!(snap.as_map().unwrap().borrow().get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_clone_is_shallow_for_maps() {
        let live = Value::object([("n", Value::from(1))]);
        let alias = live.clone();

        live.as_map().unwrap().borrow_mut().insert("n", Value::from(2));
        assert_eq!(alias.as_map().unwrap().borrow().get("n"), Some(&Value::Int(2)));
    }
}
