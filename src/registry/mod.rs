//! Store registry, active-registry slot, configuration and plugins.

mod config;
mod plugin;
mod registry;

pub use config::{RegistryConfig, ReservedFieldPolicy};
pub use plugin::{plugin_fn, FnPlugin, Plugin, PluginContext};
pub(crate) use registry::{resolve, RegistryInner};
pub use registry::{
    active_registry, clear_active_registry, create_registry, set_active_registry, Registry,
};
