//! Signals, memos and effects over the shared dependency graph.
//!
//! Store state fields are `Signal<Value>`s and getters are `Memo<Value>`s;
//! effects created while a store is built belong to that store's scope.

mod effect;
mod memo;
mod signal;

pub use effect::{create_effect, Effect};
pub use memo::{create_memo, Memo};
pub use signal::Signal;
