//! Runtime support for reactive primitives.
//!
//! This module provides the infrastructure for dependency tracking,
//! reactive graph management, batching, and subscription scopes.

mod context;
mod scope;

pub use context::{batch, untrack, MemoState, ReactiveRuntime};
pub use scope::Scope;
