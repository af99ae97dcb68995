//! Registry-backed stores.
//!
//! A store composes a state slice, memoized getters and actions into one
//! handle. Stores are defined once with [`define_store`] and instantiated at
//! most once per registry.

mod builder;
mod definition;
mod listeners;
mod state;
mod store;

pub(crate) use builder::build;
pub use definition::{
    define_store, ActionFn, GetterFn, SetupFields, SetupFn, StateFactory, StoreDefinition,
    StoreOptions, UseStore,
};
pub use listeners::{ActionCall, ActionHooks, MutationEvent, MutationKind, Subscriber, Subscription};
pub(crate) use listeners::Listeners;
pub use state::{ReadState, StateSlice};
pub use store::{Field, Patch, Store, RESERVED_FIELDS};
