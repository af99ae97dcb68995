use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::store::{Field, Store};
use crate::error::Result;
use crate::registry::{self, Registry};
use crate::signal::{Memo, Signal};

pub type StateFactory = Arc<dyn Fn() -> Value + Send + Sync>;
pub type GetterFn = Arc<dyn Fn(&Store) -> Value + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(&Store, Value) -> Result<Value> + Send + Sync>;
pub type SetupFn = Arc<dyn Fn(&Registry) -> Result<SetupFields> + Send + Sync>;

/// Options-style store description: state factory, getters and actions.
///
/// ```
/// use larder::{define_store, Registry, StoreOptions};
/// use serde_json::{json, Value};
///
/// let use_counter = define_store(
///     StoreOptions::new("counter")
///         .state(|| json!({ "count": 0 }))
///         .getter("double", |store| json!(store.get_as::<i64>("count").unwrap_or(0) * 2))
///         .action("inc", |store, _| {
///             store.state().update_as::<i64>("count", |n| *n += 1)?;
///             Ok(Value::Null)
///         }),
/// );
///
/// let registry = Registry::new();
/// let counter = use_counter.use_store_in(&registry).unwrap();
/// counter.call("inc", Value::Null).unwrap();
/// assert_eq!(counter.get("double"), Some(json!(2)));
/// ```
#[derive(Clone)]
pub struct StoreOptions {
    id: String,
    state: Option<StateFactory>,
    getters: Vec<(String, GetterFn)>,
    actions: Vec<(String, ActionFn)>,
}

impl StoreOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: None,
            getters: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Factory producing the initial state object. Without one the store
    /// starts with an empty object.
    pub fn state<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(factory));
        self
    }

    /// A getter, memoized over whatever it reads from the store.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Store) -> Value + Send + Sync + 'static,
    {
        self.getters.push((name.into(), Arc::new(getter)));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Store, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.actions.push((name.into(), Arc::new(action)));
        self
    }
}

/// Members returned by a setup function.
#[derive(Default)]
pub struct SetupFields {
    pub(crate) fields: Vec<(String, Field)>,
}

impl SetupFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state field. It becomes part of the store's state slice.
    pub fn state(mut self, name: impl Into<String>, signal: Signal<Value>) -> Self {
        self.fields.push((name.into(), Field::State(signal)));
        self
    }

    pub fn getter(mut self, name: impl Into<String>, memo: Memo<Value>) -> Self {
        self.fields.push((name.into(), Field::Getter(memo)));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Store, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.fields.push((name.into(), Field::Action(Arc::new(action))));
        self
    }

    /// A plain, non-reactive value.
    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), Field::Constant(value)));
        self
    }
}

#[derive(Clone)]
pub(crate) enum DefinitionKind {
    Options {
        state: Option<StateFactory>,
        getters: Vec<(String, GetterFn)>,
        actions: Vec<(String, ActionFn)>,
    },
    Setup(SetupFn),
}

/// An immutable store description: an id plus options or a setup function.
#[derive(Clone)]
pub struct StoreDefinition {
    id: String,
    pub(crate) kind: DefinitionKind,
}

impl StoreDefinition {
    /// Describe a store through a setup function. The setup runs once per
    /// registry, inside the store's scope, and returns the store's members.
    pub fn setup<F>(id: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&Registry) -> Result<SetupFields> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            kind: DefinitionKind::Setup(Arc::new(setup)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl From<StoreOptions> for StoreDefinition {
    fn from(options: StoreOptions) -> Self {
        Self {
            id: options.id,
            kind: DefinitionKind::Options {
                state: options.state,
                getters: options.getters,
                actions: options.actions,
            },
        }
    }
}

impl fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = match self.kind {
            DefinitionKind::Options { .. } => "options",
            DefinitionKind::Setup(_) => "setup",
        };
        f.debug_struct("StoreDefinition")
            .field("id", &self.id)
            .field("style", &style)
            .finish()
    }
}

/// Handle returned by [`define_store`]; resolves the singleton instance.
#[derive(Clone, Debug)]
pub struct UseStore {
    definition: Arc<StoreDefinition>,
}

impl UseStore {
    pub fn id(&self) -> &str {
        self.definition.id()
    }

    /// Resolve the registry from the current component (making it the active
    /// registry) or fall back to the active registry, then return the store,
    /// building it on first use.
    pub fn use_store(&self) -> Result<Store> {
        let registry = registry::resolve()?;
        self.use_store_in(&registry)
    }

    /// Return the store from an explicit registry, building it on first use.
    pub fn use_store_in(&self, registry: &Registry) -> Result<Store> {
        registry.get_or_build(&self.definition)
    }
}

/// Define a store. The returned handle yields the same instance for every
/// call against the same registry.
pub fn define_store(definition: impl Into<StoreDefinition>) -> UseStore {
    UseStore {
        definition: Arc::new(definition.into()),
    }
}
