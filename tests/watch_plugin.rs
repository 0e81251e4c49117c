//! End-to-end tests for the watch plugin against a live store.
//!
//! The recurring fixture is a three-level state tree watched at every level:
//!
//! ```text
//! state:  { foo: { bar: { baz: 1 } } }
//! spec:   foo (options) → bar (options) → baz (bare callback)
//! ```
//!
//! Spies count invocations; every mutation is followed by `next_tick()`
//! because observers only ever fire on the flush.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use statewatch::watch::handler;
use statewatch::{
    Registry, Store, StoreOptions, Value, WatchPlugin, WatchSpec, Watcher, has_pending, next_tick,
};

fn counting(calls: &Rc<Cell<usize>>) -> statewatch::WatchHandler {
    let calls = Rc::clone(calls);
    handler(move |_, _, _, _| calls.set(calls.get() + 1))
}

fn initial_state() -> Value {
    Value::object([(
        "foo",
        Value::object([("bar", Value::object([("baz", Value::from(1))]))]),
    )])
}

struct Spies {
    foo: Rc<Cell<usize>>,
    bar: Rc<Cell<usize>>,
    baz: Rc<Cell<usize>>,
}

impl Spies {
    fn counts(&self) -> (usize, usize, usize) {
        (self.foo.get(), self.bar.get(), self.baz.get())
    }
}

/// Store watched at all three levels; `deep` applies to the two levels that
/// take options (the bare `baz` callback is always deep).
fn watched_store(deep: bool) -> (Store, Spies) {
    let spies = Spies {
        foo: Rc::new(Cell::new(0)),
        bar: Rc::new(Cell::new(0)),
        baz: Rc::new(Cell::new(0)),
    };

    let spec = WatchSpec::new().entry(
        "foo",
        Watcher::WithOptions {
            handler: counting(&spies.foo),
            deep,
            children: Some(WatchSpec::new().entry(
                "bar",
                Watcher::WithOptions {
                    handler: counting(&spies.bar),
                    deep,
                    children: Some(
                        WatchSpec::new().entry("baz", Watcher::Callback(counting(&spies.baz))),
                    ),
                },
            )),
        },
    );

    let store = Registry::new()
        .with_plugin(WatchPlugin)
        .create_store(StoreOptions::new("store", initial_state).watch(spec))
        .unwrap();
    (store, spies)
}

// =============================================================================
// Deep watch
// =============================================================================

#[test]
fn deep_leaf_mutation_fires_all_levels_once() {
    let (store, spies) = watched_store(true);
    assert_eq!(spies.counts(), (0, 0, 0), "nothing fires at registration");

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    assert_eq!(store.get(&["foo", "bar", "baz"]), Some(Value::Int(10)));
    assert_eq!(spies.counts(), (0, 0, 0), "nothing fires before the flush");

    next_tick();
    assert_eq!(spies.counts(), (1, 1, 1));
}

#[test]
fn deep_middle_reassignment_fires_outer_and_middle() {
    let (store, spies) = watched_store(true);

    store
        .set(&["foo", "bar"], Value::object([("baz", Value::from(10))]))
        .unwrap();

    next_tick();
    assert_eq!(
        spies.counts(),
        (1, 1, 0),
        "the leaf observer was bound to the replaced subtree"
    );
}

#[test]
fn deep_outer_reassignment_fires_outer_only() {
    let (store, spies) = watched_store(true);

    store
        .set(
            &["foo"],
            Value::object([("bar", Value::object([("baz", Value::from(10))]))]),
        )
        .unwrap();

    next_tick();
    assert_eq!(spies.counts(), (1, 0, 0));
}

#[test]
fn deep_patch_object_equals_direct_assignment() {
    let (store, spies) = watched_store(true);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();
    assert_eq!(spies.counts(), (1, 1, 1));

    // Object patch deep-merges, so this is the same leaf assignment again.
    store
        .patch(Value::object([(
            "foo",
            Value::object([("bar", Value::object([("baz", Value::from(20))]))]),
        )]))
        .unwrap();
    assert_eq!(store.get(&["foo", "bar", "baz"]), Some(Value::Int(20)));

    next_tick();
    assert_eq!(spies.counts(), (2, 2, 2));
}

#[test]
fn deep_patch_callback_bypasses_overwritten_inner_observer() {
    let (store, spies) = watched_store(true);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();
    assert_eq!(spies.counts(), (1, 1, 1));

    store.patch_with(|s| {
        // Replaces the subtree the baz observer lives in...
        s.set(&["foo", "bar"], Value::object([("baz", Value::from(20))]))
            .unwrap();
        // ...so this mutation of the replacement never reaches it.
        s.set(&["foo", "bar", "baz"], 30).unwrap();
    });
    assert_eq!(store.get(&["foo", "bar", "baz"]), Some(Value::Int(30)));

    next_tick();
    assert_eq!(spies.counts(), (2, 2, 1));
}

#[test]
fn deep_reset_fires_only_surviving_changed_observers() {
    let (store, spies) = watched_store(true);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();
    assert_eq!(spies.counts(), (1, 1, 1));

    // Reset reassigns top-level keys: foo changes and fires; bar/baz were
    // registered inside the replaced subtree.
    store.reset().unwrap();
    assert_eq!(store.get(&["foo", "bar", "baz"]), Some(Value::Int(1)));

    next_tick();
    assert_eq!(spies.counts(), (2, 1, 1));
}

#[test]
fn reset_without_changes_fires_nothing() {
    let (store, spies) = watched_store(true);

    store.reset().unwrap();
    next_tick();
    assert_eq!(spies.counts(), (0, 0, 0), "reset to identical state is silent");
}

// =============================================================================
// Non-deep watch
// =============================================================================

#[test]
fn shallow_ignores_nested_mutation() {
    let (store, spies) = watched_store(false);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();
    assert_eq!(
        spies.counts(),
        (0, 0, 1),
        "only the bare callback (always deep) sees the leaf mutation"
    );
}

#[test]
fn shallow_fires_on_exact_reassignment() {
    let (store, spies) = watched_store(false);

    store
        .set(&["foo", "bar"], Value::object([("baz", Value::from(10))]))
        .unwrap();
    next_tick();
    assert_eq!(spies.counts(), (0, 1, 0));

    store
        .set(
            &["foo"],
            Value::object([("bar", Value::object([("baz", Value::from(10))]))]),
        )
        .unwrap();
    next_tick();
    assert_eq!(spies.counts(), (1, 1, 0));
}

#[test]
fn shallow_patch_object_reaches_only_the_leaf() {
    let (store, spies) = watched_store(false);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();

    store
        .patch(Value::object([(
            "foo",
            Value::object([("bar", Value::object([("baz", Value::from(20))]))]),
        )]))
        .unwrap();
    next_tick();

    assert_eq!(spies.counts(), (0, 0, 2), "merge assigns the leaf, not the maps");
}

#[test]
fn shallow_patch_callback_reaches_only_the_leaf() {
    let (store, spies) = watched_store(false);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();
    assert_eq!(spies.counts(), (0, 0, 1));

    store.patch_with(|s| {
        s.set(&["foo", "bar", "baz"], 20).unwrap();
    });
    next_tick();
    assert_eq!(spies.counts(), (0, 0, 2));
}

#[test]
fn shallow_reset_fires_the_reassigned_root_key() {
    let (store, spies) = watched_store(false);

    store.set(&["foo", "bar", "baz"], 10).unwrap();
    next_tick();
    assert_eq!(spies.counts(), (0, 0, 1));

    store.reset().unwrap();
    next_tick();
    assert_eq!(spies.counts(), (1, 0, 1));
}

#[test]
fn exact_reassignment_to_equal_map_fires() {
    let (store, spies) = watched_store(false);

    // Structurally identical to the current value, but a new node.
    store
        .set(
            &["foo"],
            Value::object([("bar", Value::object([("baz", Value::from(1))]))]),
        )
        .unwrap();
    next_tick();
    assert_eq!(
        spies.counts(),
        (1, 0, 0),
        "a replacement map is a new value to its observer, equal contents or not"
    );
}

#[test]
fn reassigning_the_held_node_is_silent() {
    let (store, spies) = watched_store(false);

    // The live handle the key already holds: same node, same value.
    let current = store.get(&["foo"]).unwrap();
    store.set(&["foo"], current).unwrap();
    next_tick();
    assert_eq!(spies.counts(), (0, 0, 0));
}

// =============================================================================
// Nested specs
// =============================================================================

#[test]
fn nested_spec_without_handler_fires_inner_observer() {
    let calls = Rc::new(Cell::new(0));
    let spec = WatchSpec::new().nest(
        "user",
        WatchSpec::new().entry("name", Watcher::Callback(counting(&calls))),
    );

    let store = Registry::new()
        .with_plugin(WatchPlugin)
        .create_store(
            StoreOptions::new("s", || {
                Value::object([("user", Value::object([("name", Value::from("John"))]))])
            })
            .watch(spec),
        )
        .unwrap();

    store.set(&["user", "name"], "Jane").unwrap();
    next_tick();
    assert_eq!(calls.get(), 1, "the nested entry observes the inner key only");
    assert_eq!(store.get(&["user", "name"]), Some(Value::from("Jane")));
}

// =============================================================================
// Handler arguments
// =============================================================================

#[test]
fn handler_receives_new_old_and_owning_store() {
    let seen = Rc::new(RefCell::new(Vec::<(Value, Value)>::new()));
    let store_matches = Rc::new(Cell::new(false));

    let spec = WatchSpec::new().on("foo", {
        let seen = Rc::clone(&seen);
        let store_matches = Rc::clone(&store_matches);
        move |new, old, _cleanup, store| {
            seen.borrow_mut().push((new.clone(), old.clone()));
            // The handler sees the store in its post-mutation state.
            store_matches.set(store.get(&["foo"]).as_ref() == Some(new));
        }
    });

    let store = Registry::new()
        .with_plugin(WatchPlugin)
        .create_store(
            StoreOptions::new("s", || Value::object([("foo", Value::from("foo"))])).watch(spec),
        )
        .unwrap();

    store.set(&["foo"], "bar").unwrap();
    next_tick();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, Value::from("bar"));
    assert_eq!(seen[0].1, Value::from("foo"));
    assert!(store_matches.get());
}

#[test]
fn cleanup_runs_before_refire_and_on_teardown() {
    let cleanups = Rc::new(Cell::new(0));

    let spec = WatchSpec::new().on("n", {
        let cleanups = Rc::clone(&cleanups);
        move |_, _, on_cleanup, _| {
            let cleanups = Rc::clone(&cleanups);
            on_cleanup.register(move || cleanups.set(cleanups.get() + 1));
        }
    });

    let store = Registry::new()
        .with_plugin(WatchPlugin)
        .create_store(
            StoreOptions::new("s", || Value::object([("n", Value::from(1))])).watch(spec),
        )
        .unwrap();

    store.set(&["n"], 2).unwrap();
    next_tick();
    assert_eq!(cleanups.get(), 0, "first invocation only registers");

    store.set(&["n"], 3).unwrap();
    next_tick();
    assert_eq!(cleanups.get(), 1, "cleanup ran before the second invocation");

    drop(store);
    assert_eq!(cleanups.get(), 2, "teardown runs the last registered cleanup");
}

// =============================================================================
// Tick batching
// =============================================================================

#[test]
fn same_tick_mutations_collapse_to_one_invocation() {
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::<(Value, Value)>::new()));

    let spec = WatchSpec::new().on("n", {
        let calls = Rc::clone(&calls);
        let seen = Rc::clone(&seen);
        move |new, old, _, _| {
            calls.set(calls.get() + 1);
            seen.borrow_mut().push((new.clone(), old.clone()));
        }
    });

    let store = Registry::new()
        .with_plugin(WatchPlugin)
        .create_store(
            StoreOptions::new("s", || Value::object([("n", Value::from(1))])).watch(spec),
        )
        .unwrap();

    store.set(&["n"], 2).unwrap();
    store.set(&["n"], 3).unwrap();
    assert!(has_pending());

    next_tick();
    assert!(!has_pending());
    assert_eq!(calls.get(), 1, "two same-tick mutations, one invocation");
    assert_eq!(seen.borrow()[0], (Value::Int(3), Value::Int(1)));

    // Separate ticks fire separately.
    store.set(&["n"], 4).unwrap();
    next_tick();
    assert_eq!(calls.get(), 2);
}

#[test]
fn same_tick_round_trip_is_silent() {
    let calls = Rc::new(Cell::new(0));
    let spec = WatchSpec::new().on("n", {
        let calls = Rc::clone(&calls);
        move |_, _, _, _| calls.set(calls.get() + 1)
    });

    let store = Registry::new()
        .with_plugin(WatchPlugin)
        .create_store(
            StoreOptions::new("s", || Value::object([("n", Value::from(1))])).watch(spec),
        )
        .unwrap();

    store.set(&["n"], 2).unwrap();
    store.set(&["n"], 1).unwrap();
    next_tick();
    assert_eq!(calls.get(), 0, "net value is unchanged, so the observer stays silent");
}
