//! Host component tree with typed provide/inject.
//!
//! Stands in for the UI framework's context mechanism: registries and central
//! stores are installed on a component and resolved by its descendants.

mod component;

pub use component::Component;
