//! Integration tests for Larder

use futures::executor::block_on;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use larder::{
    batch, create_effect, create_memo, define_store, map_actions, map_getters, map_mutations,
    map_state, CentralOptions, CentralStore, Component, MutationKind, Patch, Registry,
    SetupFields, Signal, StoreDefinition, StoreError, StoreOptions, UseStore,
};

fn counter(getter_calls: Arc<AtomicUsize>) -> UseStore {
    define_store(
        StoreOptions::new("counter")
            .state(|| json!({ "count": 0 }))
            .getter("double", move |store| {
                getter_calls.fetch_add(1, Ordering::SeqCst);
                json!(store.get_as::<i64>("count").unwrap_or(0) * 2)
            })
            .action("increment", |store, _| {
                store.state().update_as::<i64>("count", |n| *n += 1)?;
                Ok(Value::Null)
            }),
    )
}

#[test]
fn signal_memo_effect_integration() {
    let count = Signal::new(1);
    let runs = Arc::new(AtomicUsize::new(0));

    let squared = create_memo({
        let count = count.clone();
        move || count.get() * count.get()
    });
    let _effect = create_effect({
        let squared = squared.clone();
        let runs = runs.clone();
        move || {
            let _ = squared.get();
            runs.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Effect runs immediately
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    count.set(3);
    assert_eq!(squared.get(), 9);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // Batched writes re-run the effect once
    batch(|| {
        count.set(4);
        count.set(5);
    });
    assert_eq!(squared.get(), 25);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[test]
fn counter_end_to_end() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = Registry::new();
    let use_counter = counter(calls.clone());

    let store = use_counter.use_store_in(&registry).unwrap();
    assert!(store.ptr_eq(&use_counter.use_store_in(&registry).unwrap()));

    assert_eq!(store.get("count"), Some(json!(0)));
    assert_eq!(store.get("double"), Some(json!(0)));

    store.call("increment", Value::Null).unwrap();
    assert_eq!(store.get("count"), Some(json!(1)));
    assert_eq!(store.get("double"), Some(json!(2)));
    assert_eq!(store.get("double"), Some(json!(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Disposal: the old getter stops following state
    store.dispose();
    store.set("count", json!(41)).unwrap();
    assert_eq!(store.get("double"), Some(json!(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let rebuilt = use_counter.use_store_in(&registry).unwrap();
    assert!(!rebuilt.ptr_eq(&store));
    assert_eq!(rebuilt.get("count"), Some(json!(0)));
    assert_eq!(registry.state_snapshot(), json!({ "counter": { "count": 0 } }));
}

#[test]
fn patch_and_subscribe() {
    let registry = Registry::new();
    let store = define_store(
        StoreOptions::new("profile").state(|| json!({ "name": "Ada", "visits": 0 })),
    )
    .use_store_in(&registry)
    .unwrap();

    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let subscription = store.subscribe({
        let events = events.clone();
        move |event, state| events.lock().push((event.clone(), state.clone()))
    });

    store
        .patch(Patch::with(|state| {
            state.update_as::<i64>("visits", |n| *n += 1).unwrap();
            state.set("name", json!("Grace")).unwrap();
        }))
        .unwrap();
    assert!(matches!(
        store.patch(Patch::Object(json!({ "name": "Linus" }))),
        Err(StoreError::UnsupportedPatch)
    ));

    subscription.unsubscribe();
    store.set("visits", json!(10)).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0.store_id, "profile");
    assert_eq!(events[0].0.kind, MutationKind::PatchFunction);
    assert_eq!(events[0].1, json!({ "name": "Grace", "visits": 1 }));
}

#[test]
fn actions_notify_subscribers_when_state_changes() {
    let registry = Registry::new();
    let store = define_store(
        StoreOptions::new("cart")
            .state(|| json!({ "items": 0, "total": 0 }))
            .action("add", |store, price| {
                let price = price.as_i64().unwrap_or(0);
                store.state().update_as::<i64>("items", |n| *n += 1)?;
                store.state().update_as::<i64>("total", |n| *n += price)?;
                Ok(Value::Null)
            })
            .action("peek", |store, _| Ok(json!(store.get_as::<i64>("items")?))),
    )
    .use_store_in(&registry)
    .unwrap();

    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let _subscription = store.subscribe({
        let events = events.clone();
        move |event, state| events.lock().push((event.kind.clone(), state.clone()))
    });

    store.call("add", json!(30)).unwrap();
    store.call("peek", Value::Null).unwrap();

    // One event per changing action, none for a read-only one
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        (
            MutationKind::Action { name: "add".into() },
            json!({ "items": 1, "total": 30 })
        )
    );
}

#[test]
fn setup_store_with_local_getter() {
    let registry = Registry::new();
    let use_todos = define_store(StoreDefinition::setup("todos", |_| {
        let items = Signal::new(json!([]));
        let remaining = create_memo({
            let items = items.clone();
            move || {
                let open = items.with(|items| {
                    items
                        .as_array()
                        .map(|items| items.iter().filter(|item| item["done"] == false).count())
                        .unwrap_or(0)
                });
                json!(open)
            }
        });
        Ok(SetupFields::new()
            .state("items", items)
            .getter("remaining", remaining)
            .action("add", |store, title| {
                store.state().update("items", |items| {
                    if let Value::Array(items) = items {
                        items.push(json!({ "title": title, "done": false }));
                    }
                })?;
                Ok(Value::Null)
            }))
    }));

    let todos = use_todos.use_store_in(&registry).unwrap();
    todos.call("add", json!("write docs")).unwrap();
    todos.call("add", json!("ship")).unwrap();

    assert_eq!(todos.get("remaining"), Some(json!(2)));
    assert!(matches!(
        todos.reset(),
        Err(StoreError::NotImplemented { .. })
    ));
}

#[test]
fn central_store_through_component_tree() {
    let root = Component::root();
    let store = CentralStore::new(
        CentralOptions::new()
            .state(json!({ "count": 0, "name": "central" }))
            .mutation("increment", |state, _| {
                state.update_as::<i64>("count", |n| *n += 1)
            })
            .action("increment", |ctx, _| async move {
                ctx.commit("increment", Value::Null)?;
                Ok(Value::Null)
            })
            .getter("double", |state| {
                json!(state.get_as::<i64>("count").unwrap_or(0) * 2)
            }),
    )
    .unwrap();
    store.install(&root);

    let leaf = root.child().child();
    let state = map_state(["count", "name"]).unwrap();
    let getters = map_getters(["double"]).unwrap();
    let mutations = map_mutations(["increment"]).unwrap();
    let actions = map_actions(["increment"]).unwrap();

    mutations["increment"](&leaf, Value::Null).unwrap();
    block_on(actions["increment"](&leaf, Value::Null).unwrap()).unwrap();

    assert_eq!(state["count"](&leaf).unwrap(), json!(2));
    assert_eq!(state["name"](&leaf).unwrap(), json!("central"));
    assert_eq!(getters["double"](&leaf).unwrap(), json!(4));
    assert!(matches!(
        store.dispatch("doesNotExist", Value::Null),
        Err(StoreError::UnknownAction(_))
    ));
}

proptest! {
    #[test]
    fn use_store_always_returns_the_singleton(lookups in 1usize..20) {
        let registry = Registry::new();
        let use_counter = counter(Arc::default());
        let first = use_counter.use_store_in(&registry).unwrap();

        for _ in 0..lookups {
            prop_assert!(first.ptr_eq(&use_counter.use_store_in(&registry).unwrap()));
        }
        prop_assert_eq!(registry.store_ids(), vec!["counter".to_string()]);
    }

    #[test]
    fn commits_accumulate(amounts in proptest::collection::vec(-100i64..100, 0..30)) {
        let store = CentralStore::new(
            CentralOptions::new()
                .state(json!({ "total": 0 }))
                .mutation("add", |state, payload| {
                    let amount = payload.as_i64().unwrap_or(0);
                    state.update_as::<i64>("total", |n| *n += amount)
                }),
        )
        .unwrap();

        for amount in &amounts {
            store.commit("add", json!(amount)).unwrap();
        }
        prop_assert_eq!(
            store.state().get("total"),
            Some(json!(amounts.iter().sum::<i64>()))
        );
    }

    #[test]
    fn getter_recomputes_once_per_write(writes in 0usize..15, reads in 1usize..5) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let store = counter(calls.clone()).use_store_in(&registry).unwrap();

        for _ in 0..writes {
            store.call("increment", Value::Null).unwrap();
            for _ in 0..reads {
                let _ = store.get("double");
            }
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), writes);
    }
}
