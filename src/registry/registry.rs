use parking_lot::{const_rwlock, ReentrantMutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use super::config::RegistryConfig;
use super::plugin::{Plugin, PluginContext};
use crate::error::{Result, StoreError};
use crate::host::Component;
use crate::runtime::{untrack, Scope};
use crate::signal::Signal;
use crate::store::{self, StateSlice, Store, StoreDefinition};

pub(crate) enum Slot {
    /// The store's setup is running.
    Building,
    Ready(Store),
}

pub(crate) struct RegistryInner {
    config: RegistryConfig,
    root_scope: Scope,
    root_state: Signal<BTreeMap<String, StateSlice>>,
    instances: RwLock<HashMap<String, Slot>>,
    // Serialises check-build-insert; reentrant so a setup may build other stores.
    build_lock: ReentrantMutex<()>,
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
}

/// A registry of singleton stores.
///
/// Holds the root state tree (one slice per store id), the detached root
/// scope that parents every store scope, and the id → instance map.
/// Cloning yields another handle to the same registry.
///
/// # Examples
///
/// ```
/// use larder::{define_store, Registry, StoreOptions};
/// use serde_json::json;
///
/// let use_settings = define_store(StoreOptions::new("settings").state(|| json!({ "dark": false })));
///
/// let registry = Registry::new();
/// let a = use_settings.use_store_in(&registry).unwrap();
/// let b = use_settings.use_store_in(&registry).unwrap();
/// assert!(a.ptr_eq(&b));
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

static ACTIVE: RwLock<Option<Registry>> = const_rwlock(None);

/// Make `registry` the process-wide fallback used by `use_store` outside
/// components.
pub fn set_active_registry(registry: Registry) {
    *ACTIVE.write() = Some(registry);
}

pub fn active_registry() -> Option<Registry> {
    ACTIVE.read().clone()
}

pub fn clear_active_registry() {
    ACTIVE.write().take();
}

/// Registry for a `use_store` call site: the one injected into the current
/// component (which also becomes active), else the active one.
pub(crate) fn resolve() -> Result<Registry> {
    if let Some(registry) = Component::current().and_then(|c| c.inject::<Registry>()) {
        set_active_registry(registry.clone());
        return Ok(registry);
    }
    active_registry().ok_or(StoreError::NoActiveRegistry)
}

/// Create a registry with the default configuration.
pub fn create_registry() -> Registry {
    Registry::new()
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let root_scope = Scope::new(true);
        tracing::debug!(registry = %config.label, "registry created");
        Self {
            inner: Arc::new(RegistryInner {
                config,
                root_scope,
                root_state: Signal::new(BTreeMap::new()),
                instances: RwLock::new(HashMap::new()),
                build_lock: ReentrantMutex::new(()),
                plugins: RwLock::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RegistryInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    pub(crate) fn root_scope(&self) -> &Scope {
        &self.inner.root_scope
    }

    /// False once [`teardown`](Registry::teardown) ran.
    pub fn is_active(&self) -> bool {
        self.inner.root_scope.is_active()
    }

    /// Provide this registry to `component` and its descendants, and make it
    /// the active registry. Installing again just repeats both steps.
    pub fn install(&self, component: &Component) {
        component.provide(self.clone());
        set_active_registry(self.clone());
        tracing::debug!(
            registry = %self.inner.config.label,
            component = component.id(),
            "registry installed"
        );
    }

    /// Register a plugin for every store built from now on.
    pub fn use_plugin(&self, plugin: impl Plugin + 'static) -> Result<()> {
        let name = plugin.name().trim().to_string();
        if name.is_empty() {
            return Err(StoreError::InvalidPlugin("plugin name is empty".to_string()));
        }
        let mut plugins = self.inner.plugins.write();
        if plugins.iter().any(|existing| existing.name() == name) {
            return Err(StoreError::InvalidPlugin(format!(
                "plugin `{name}` is already registered"
            )));
        }
        plugins.push(Arc::new(plugin));
        tracing::debug!(registry = %self.inner.config.label, plugin = %name, "plugin registered");
        Ok(())
    }

    /// The live instance for `id`, if built and not disposed.
    pub fn lookup(&self, id: &str) -> Option<Store> {
        match self.inner.instances.read().get(id) {
            Some(Slot::Ready(store)) => Some(store.clone()),
            _ => None,
        }
    }

    pub fn has_store(&self, id: &str) -> bool {
        self.lookup(id).is_some()
    }

    /// Ids of every live store, sorted.
    pub fn store_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .instances
            .read()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The root state slice for `id`. Slices outlive disposal until the next
    /// build of the same id replaces them.
    pub fn state_of(&self, id: &str) -> Option<StateSlice> {
        self.inner.root_state.with(|slices| slices.get(id).cloned())
    }

    /// JSON snapshot of the whole root state tree.
    pub fn state_snapshot(&self) -> Value {
        let object: Map<String, Value> = self.inner.root_state.with(|slices| {
            slices
                .iter()
                .map(|(id, slice)| (id.clone(), slice.snapshot()))
                .collect()
        });
        Value::Object(object)
    }

    pub(crate) fn set_root_slice(&self, id: &str, slice: StateSlice) {
        self.inner.root_state.update(|slices| {
            slices.insert(id.to_string(), slice);
        });
    }

    pub(crate) fn get_or_build(&self, definition: &StoreDefinition) -> Result<Store> {
        let id = definition.id();
        if let Some(store) = self.lookup(id) {
            return Ok(store);
        }
        if !self.is_active() {
            return Err(StoreError::RegistryStopped);
        }

        let _build = self.inner.build_lock.lock();
        {
            let mut instances = self.inner.instances.write();
            match instances.get(id) {
                Some(Slot::Ready(store)) => return Ok(store.clone()),
                Some(Slot::Building) => return Err(StoreError::CircularBuild(id.to_string())),
                None => {
                    instances.insert(id.to_string(), Slot::Building);
                }
            }
        }

        let marker = BuildingMarker {
            instances: &self.inner.instances,
            id,
        };
        // A build triggered from inside an effect must not subscribe it.
        let store = match untrack(|| store::build(self, definition)) {
            Ok(store) => store,
            Err(err) => {
                tracing::debug!(registry = %self.inner.config.label, store = id, error = %err, "store build failed");
                return Err(err);
            }
        };
        std::mem::forget(marker);
        self.inner
            .instances
            .write()
            .insert(id.to_string(), Slot::Ready(store.clone()));
        tracing::debug!(registry = %self.inner.config.label, store = id, "store built");

        self.run_plugins(&store);
        Ok(store)
    }

    fn run_plugins(&self, store: &Store) {
        let plugins: Vec<Arc<dyn Plugin>> = self.inner.plugins.read().clone();
        if plugins.is_empty() {
            return;
        }
        let ctx = PluginContext {
            registry: self,
            store,
        };
        store.scope().run(|| {
            for plugin in &plugins {
                tracing::trace!(store = store.id(), plugin = plugin.name(), "running plugin");
                plugin.on_store(&ctx);
            }
        });
    }

    /// Remove `store` from the instance map if it is still the registered
    /// instance for its id.
    pub(crate) fn remove_instance(&self, store: &Store) {
        let mut instances = self.inner.instances.write();
        if let Some(Slot::Ready(current)) = instances.get(store.id()) {
            if current.ptr_eq(store) {
                instances.remove(store.id());
            }
        }
    }

    /// Stop the root scope, cascading to every store, and forget all
    /// instances. Later builds fail with [`StoreError::RegistryStopped`].
    pub fn teardown(&self) {
        self.inner.root_scope.stop();
        let stores: Vec<Store> = self
            .inner
            .instances
            .write()
            .drain()
            .filter_map(|(_, slot)| match slot {
                Slot::Ready(store) => Some(store),
                Slot::Building => None,
            })
            .collect();
        for store in &stores {
            store.release();
        }
        tracing::debug!(
            registry = %self.inner.config.label,
            stores = stores.len(),
            "registry torn down"
        );
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Clears the `Building` slot of a build that failed or unwound.
struct BuildingMarker<'a> {
    instances: &'a RwLock<HashMap<String, Slot>>,
    id: &'a str,
}

impl Drop for BuildingMarker<'_> {
    fn drop(&mut self) {
        let mut instances = self.instances.write();
        if matches!(instances.get(self.id), Some(Slot::Building)) {
            instances.remove(self.id);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("label", &self.inner.config.label)
            .field("stores", &self.store_ids())
            .field("active", &self.is_active())
            .finish()
    }
}
