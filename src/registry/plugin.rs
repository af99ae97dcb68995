use std::fmt;

use super::registry::Registry;
use crate::store::Store;

/// What a plugin sees for each newly built store.
pub struct PluginContext<'a> {
    pub registry: &'a Registry,
    pub store: &'a Store,
}

/// Extension hook run once for every store built after registration.
///
/// Plugins run inside the new store's scope, so effects they create stop when
/// the store is disposed.
pub trait Plugin: Send + Sync {
    /// Unique, non-empty name.
    fn name(&self) -> &str;

    fn on_store(&self, ctx: &PluginContext<'_>);
}

/// A plugin backed by a closure.
pub struct FnPlugin<F> {
    name: String,
    f: F,
}

impl<F> Plugin for FnPlugin<F>
where
    F: Fn(&PluginContext<'_>) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_store(&self, ctx: &PluginContext<'_>) {
        (self.f)(ctx)
    }
}

impl<F> fmt::Debug for FnPlugin<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin").field("name", &self.name).finish()
    }
}

/// Build a plugin from a name and a closure.
///
/// ```
/// use larder::{plugin_fn, Registry};
///
/// let registry = Registry::new();
/// registry
///     .use_plugin(plugin_fn("log-builds", |ctx| println!("built {}", ctx.store.id())))
///     .unwrap();
/// ```
pub fn plugin_fn<F>(name: impl Into<String>, f: F) -> FnPlugin<F>
where
    F: Fn(&PluginContext<'_>) + Send + Sync,
{
    FnPlugin {
        name: name.into(),
        f,
    }
}
