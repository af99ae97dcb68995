//! Central store: one store per component tree, mutated through named
//! mutations and actions.
//!
//! Unlike registry stores there is no per-id lookup and getters are not
//! cached; every getter read evaluates the getter again.

mod mapping;
mod store;

pub use mapping::{
    map_actions, map_getters, map_mutations, map_state, ActionAccessor, GetterAccessor,
    IntoNames, MutationAccessor, StateAccessor,
};
pub use store::{
    ActionContext, ActionFuture, CentralActionFn, CentralGetterFn, CentralOptions, CentralStore,
    MutationFn, CENTRAL_STORE_ID,
};
