//! Demonstration of the central store: mutations, async actions and the
//! `map_*` helpers used from a component tree.

use futures::executor::block_on;
use larder::{
    map_actions, map_getters, map_mutations, map_state, CentralOptions, CentralStore, Component,
    StoreError,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn todo_store() -> larder::Result<CentralStore> {
    CentralStore::new(
        CentralOptions::new()
            .state(json!({ "todos": [], "filter": "all" }))
            .mutation("add", |state, title| {
                state.update("todos", |todos| {
                    if let Value::Array(todos) = todos {
                        let id = todos.len();
                        todos.push(json!({ "id": id, "title": title, "done": false }));
                    }
                })
            })
            .mutation("toggle", |state, id| {
                let id = id
                    .as_u64()
                    .ok_or_else(|| StoreError::InvalidArgument("todo id must be a number".into()))?;
                state.update("todos", |todos| {
                    if let Some(todo) = todos.get_mut(id as usize) {
                        todo["done"] = json!(!todo["done"].as_bool().unwrap_or(false));
                    }
                })
            })
            .mutation("set_filter", |state, filter| state.set("filter", filter))
            .action("import", |ctx, titles| async move {
                let titles = titles.as_array().cloned().unwrap_or_default();
                for title in &titles {
                    ctx.commit("add", title.clone())?;
                }
                Ok(json!(titles.len()))
            })
            .getter("remaining", |state| {
                let todos = state.get("todos").unwrap_or_default();
                let open = todos
                    .as_array()
                    .map(|todos| todos.iter().filter(|todo| todo["done"] == false).count())
                    .unwrap_or(0);
                json!(open)
            }),
    )
}

fn main() -> larder::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Central Store Example: Todo App ===\n");

    let app = Component::root();
    let store = todo_store()?;
    store.install(&app);

    println!("1. Setting up subscriber");
    let _subscription = store.subscribe(|event, state| {
        let count = state["todos"].as_array().map_or(0, Vec::len);
        println!("   [commit] {:?} -> {} todos", event.kind, count);
    });

    let list = app.child();
    let state = map_state(["todos", "filter"])?;
    let getters = map_getters(["remaining"])?;
    let mutations = map_mutations(["add", "toggle", "set_filter"])?;
    let actions = map_actions(["import"])?;

    println!("\n2. Adding todos");
    mutations["add"](&list, json!("Learn Rust"))?;
    let imported = block_on(actions["import"](&list, json!(["Build a store", "Write docs"]))?)?;
    println!("   imported {imported} todos");

    println!("\n3. Completing the first todo");
    mutations["toggle"](&list, json!(0))?;
    mutations["set_filter"](&list, json!("active"))?;

    println!("\n4. Current todos (filter: {}):", state["filter"](&list)?);
    if let Value::Array(todos) = state["todos"](&list)? {
        for todo in todos {
            let status = if todo["done"] == true { "✓" } else { " " };
            println!("   [{}] {}", status, todo["title"].as_str().unwrap_or_default());
        }
    }
    println!("   remaining: {}", getters["remaining"](&list)?);

    println!("\n✓ Example complete!");
    Ok(())
}
