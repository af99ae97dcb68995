//! # Larder
//!
//! A reactive store registry for Rust.
//!
//! Larder keeps application state outside any one component's lifetime and
//! offers two levels of abstraction:
//!
//! ## Signals (Low-level primitives)
//!
//! Fine-grained reactive primitives the stores are built on:
//! - `Signal<T>` - Reactive values that notify dependents when changed
//! - `Memo<T>` - Lazily computed, cached values that track their dependencies
//! - `Effect` - Side effects that run when dependencies change
//! - `Scope` - Groups of subscriptions that are stopped together
//!
//! ## Stores (High-level state management)
//!
//! - `Registry` - Holds one singleton `Store` per id, created on first use
//! - `define_store` - Options-style (state, getters, actions) or setup-style
//!   store definitions
//! - `Store` - State fields, memoized getters and actions behind one handle,
//!   with `patch`, `reset`, `subscribe`, `on_action` and `dispose`
//! - `CentralStore` - A single tree-wide store driven by `commit` and
//!   `dispatch`, with `map_state`-style helpers
//!
//! ```
//! use larder::{define_store, Registry, StoreOptions};
//! use serde_json::{json, Value};
//!
//! let use_counter = define_store(
//!     StoreOptions::new("counter")
//!         .state(|| json!({ "count": 0 }))
//!         .getter("double", |store| json!(store.get_as::<i64>("count").unwrap_or(0) * 2))
//!         .action("inc", |store, _| {
//!             store.state().update_as::<i64>("count", |n| *n += 1)?;
//!             Ok(Value::Null)
//!         }),
//! );
//!
//! let registry = Registry::new();
//! let counter = use_counter.use_store_in(&registry).unwrap();
//! counter.call("inc", Value::Null).unwrap();
//! assert_eq!(counter.get("count"), Some(json!(1)));
//! assert_eq!(counter.get("double"), Some(json!(2)));
//! ```

pub mod central;
pub mod error;
pub mod host;
pub mod registry;
pub mod runtime;
pub mod signal;
pub mod store;

// Re-export main types for convenience
pub use central::{
    map_actions, map_getters, map_mutations, map_state, ActionContext, ActionFuture,
    CentralOptions, CentralStore,
};
pub use error::{Result, StoreError};
pub use host::Component;
pub use registry::{
    active_registry, clear_active_registry, create_registry, plugin_fn, set_active_registry,
    Plugin, PluginContext, Registry, RegistryConfig, ReservedFieldPolicy,
};
pub use runtime::{batch, untrack, Scope};
pub use signal::{create_effect, create_memo, Effect, Memo, Signal};
pub use store::{
    define_store, ActionCall, ActionHooks, MutationEvent, MutationKind, Patch, ReadState,
    SetupFields, StateSlice, Store, StoreDefinition, StoreOptions, Subscription, UseStore,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_works() {
        // Basic smoke test
        let registry = Registry::new();
        let use_flag = define_store(StoreOptions::new("flag").state(|| json!({ "on": false })));
        let flag = use_flag.use_store_in(&registry).unwrap();
        assert_eq!(flag.get("on"), Some(json!(false)));
        flag.set("on", json!(true)).unwrap();
        assert_eq!(flag.get("on"), Some(json!(true)));
    }
}
