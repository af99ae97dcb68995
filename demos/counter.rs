//! Demonstration of registry stores: options and setup definitions, getters,
//! patches, subscriptions and disposal.
//!
//! Run with `RUST_LOG=larder=debug` to see the registry's log output.

use larder::{
    create_memo, define_store, plugin_fn, ActionHooks, Component, Registry, SetupFields, Signal,
    StoreDefinition, StoreOptions,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn main() -> larder::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Registry Example: Counter ===\n");

    let use_counter = define_store(
        StoreOptions::new("counter")
            .state(|| json!({ "count": 0, "step": 1 }))
            .getter("double", |store| {
                json!(store.get_as::<i64>("count").unwrap_or(0) * 2)
            })
            .action("increment", |store, _| {
                let step: i64 = store.get_as("step")?;
                store.state().update_as::<i64>("count", |n| *n += step)?;
                Ok(json!(store.get_as::<i64>("count")?))
            }),
    );

    // A setup store that reads another store while it is built
    let use_label = define_store(StoreDefinition::setup("label", {
        let use_counter = use_counter.clone();
        move |registry| {
            let counter = use_counter.use_store_in(registry)?;
            let prefix = Signal::new(json!("clicked"));
            let text = create_memo({
                let prefix = prefix.clone();
                move || {
                    let count = counter.get("count").unwrap_or(Value::Null);
                    json!(format!("{} {} times", prefix.get().as_str().unwrap_or(""), count))
                }
            });
            Ok(SetupFields::new().state("prefix", prefix).getter("text", text))
        }
    }));

    // 1. Install the registry at the root of a component tree
    println!("1. Installing registry");
    let registry = Registry::new();
    registry.use_plugin(plugin_fn("announce", |ctx| {
        println!("   [plugin] built store `{}`", ctx.store.id());
    }))?;
    let app = Component::root();
    registry.install(&app);

    // 2. Resolve stores from a nested component
    println!("\n2. Using stores from a child component");
    let (counter, label) = app.child().run(|| -> larder::Result<_> {
        Ok((use_counter.use_store()?, use_label.use_store()?))
    })?;

    let _subscription = counter.subscribe(|event, state| {
        println!("   [subscribe] {:?} -> {}", event.kind, state);
    });
    let _hooks = counter.on_action(ActionHooks::new().after(|call, result| {
        println!("   [action] {} returned {}", call.name, result);
    }));

    // 3. Actions and getters
    println!("\n3. Incrementing twice");
    counter.call("increment", Value::Null)?;
    counter.call("increment", Value::Null)?;
    println!("   double = {}", counter.get("double").unwrap_or_default());
    println!("   label  = {}", label.get("text").unwrap_or_default());

    // 4. Patch several fields at once
    println!("\n4. Patching step and count");
    counter.patch_with(|state| {
        let _ = state.set("step", json!(10));
        let _ = state.set("count", json!(100));
    })?;
    counter.call("increment", Value::Null)?;
    println!("   double = {}", counter.get("double").unwrap_or_default());

    // 5. Reset and dispose
    println!("\n5. Resetting, then disposing");
    counter.reset()?;
    println!("   root state = {}", registry.state_snapshot());
    counter.dispose();
    let fresh = use_counter.use_store_in(&registry)?;
    println!("   rebuilt instance: {}", !fresh.ptr_eq(&counter));

    registry.teardown();
    println!("\n✓ Example complete!");
    Ok(())
}
