use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::host::Component;
use crate::runtime::batch;
use crate::store::{
    Listeners, MutationEvent, MutationKind, ReadState, StateSlice, Subscriber, Subscription,
};

/// Store id reported in [`MutationEvent`]s from a central store.
pub const CENTRAL_STORE_ID: &str = "central";

/// Future returned by [`CentralStore::dispatch`].
pub type ActionFuture = BoxFuture<'static, Result<Value>>;

pub type MutationFn = Arc<dyn Fn(&StateSlice, Value) -> Result<()> + Send + Sync>;
pub type CentralActionFn = Arc<dyn Fn(ActionContext, Value) -> ActionFuture + Send + Sync>;
pub type CentralGetterFn = Arc<dyn Fn(&ReadState) -> Value + Send + Sync>;

/// Options for a [`CentralStore`]: initial state, mutations, actions and
/// getters.
pub struct CentralOptions {
    state: Value,
    mutations: HashMap<String, MutationFn>,
    actions: HashMap<String, CentralActionFn>,
    getters: HashMap<String, CentralGetterFn>,
}

impl Default for CentralOptions {
    fn default() -> Self {
        Self {
            state: Value::Object(Map::new()),
            mutations: HashMap::new(),
            actions: HashMap::new(),
            getters: HashMap::new(),
        }
    }
}

impl CentralOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state; must be a JSON object.
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// A synchronous mutation. Mutations are the only code that receives a
    /// writable state handle.
    pub fn mutation<F>(mut self, name: impl Into<String>, mutation: F) -> Self
    where
        F: Fn(&StateSlice, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(mutation));
        self
    }

    /// An action; it may await and is expected to `commit` its changes.
    pub fn action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.actions.insert(
            name.into(),
            Arc::new(move |ctx, payload| action(ctx, payload).boxed()),
        );
        self
    }

    /// A getter. Central-store getters are evaluated on every access.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&ReadState) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }
}

struct CentralInner {
    state: StateSlice,
    mutations: HashMap<String, MutationFn>,
    actions: HashMap<String, CentralActionFn>,
    getters: HashMap<String, CentralGetterFn>,
    subscribers: Listeners<Subscriber>,
}

/// A single store shared by a whole component tree, driven by named
/// mutations (`commit`) and actions (`dispatch`).
///
/// # Examples
///
/// ```
/// use larder::{CentralOptions, CentralStore};
/// use serde_json::{json, Value};
///
/// let store = CentralStore::new(
///     CentralOptions::new()
///         .state(json!({ "count": 0 }))
///         .mutation("inc", |state, _| state.update_as::<i64>("count", |n| *n += 1))
///         .action("inc_twice", |ctx, _| async move {
///             ctx.commit("inc", Value::Null)?;
///             ctx.commit("inc", Value::Null)?;
///             Ok(Value::Null)
///         }),
/// )
/// .unwrap();
///
/// store.commit("inc", Value::Null).unwrap();
/// futures::executor::block_on(store.dispatch("inc_twice", Value::Null).unwrap()).unwrap();
/// assert_eq!(store.state().get("count"), Some(json!(3)));
/// ```
#[derive(Clone)]
pub struct CentralStore {
    inner: Arc<CentralInner>,
}

impl CentralStore {
    pub fn new(options: CentralOptions) -> Result<Self> {
        let state = StateSlice::from_value(CENTRAL_STORE_ID, options.state)?;
        Ok(Self {
            inner: Arc::new(CentralInner {
                state,
                mutations: options.mutations,
                actions: options.actions,
                getters: options.getters,
                subscribers: Listeners::new(),
            }),
        })
    }

    /// Read-only view of the state.
    pub fn state(&self) -> ReadState {
        self.inner.state.read_only()
    }

    /// Run the mutation `name` synchronously.
    pub fn commit(&self, name: &str, payload: Value) -> Result<()> {
        let mutation = self
            .inner
            .mutations
            .get(name)
            .ok_or_else(|| StoreError::UnknownMutation(name.to_string()))?;
        tracing::trace!(mutation = name, "commit");

        let state = &self.inner.state;
        let event_payload = payload.clone();
        batch(|| mutation(state, payload))?;

        if !self.inner.subscribers.is_empty() {
            let event = MutationEvent {
                store_id: CENTRAL_STORE_ID.to_string(),
                kind: MutationKind::Commit {
                    name: name.to_string(),
                    payload: event_payload,
                },
            };
            let snapshot = state.snapshot();
            for subscriber in self.inner.subscribers.snapshot() {
                subscriber(&event, &snapshot);
            }
        }
        Ok(())
    }

    /// Start the action `name`.
    ///
    /// An unknown name fails immediately; otherwise the returned future
    /// drives the action. Dispatches are not serialised against each other.
    pub fn dispatch(&self, name: &str, payload: Value) -> Result<ActionFuture> {
        let action = self
            .inner
            .actions
            .get(name)
            .ok_or_else(|| StoreError::UnknownAction(name.to_string()))?;
        tracing::trace!(action = name, "dispatch");
        Ok(action(ActionContext { store: self.clone() }, payload))
    }

    /// Evaluate the getter `name`. Nothing is cached.
    pub fn getter(&self, name: &str) -> Result<Value> {
        let getter = self
            .inner
            .getters
            .get(name)
            .ok_or_else(|| StoreError::UnknownGetter(name.to_string()))?;
        Ok(getter(&self.state()))
    }

    /// Register a callback run after every commit.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&MutationEvent, &Value) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(f))
    }

    /// Make this store reachable from `component` and every descendant.
    pub fn install(&self, component: &Component) {
        component.provide(self.clone());
        tracing::debug!(component = component.id(), "central store installed");
    }

    /// The store installed above `component`.
    pub fn of(component: &Component) -> Result<Self> {
        component
            .inject::<CentralStore>()
            .ok_or(StoreError::NoStoreInstalled)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for CentralStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mutations: Vec<_> = self.inner.mutations.keys().collect();
        mutations.sort();
        let mut actions: Vec<_> = self.inner.actions.keys().collect();
        actions.sort();
        f.debug_struct("CentralStore")
            .field("state", &self.inner.state.snapshot())
            .field("mutations", &mutations)
            .field("actions", &actions)
            .finish()
    }
}

/// What an action receives: read-only state plus `commit`, `dispatch` and
/// getters of its store.
#[derive(Clone, Debug)]
pub struct ActionContext {
    store: CentralStore,
}

impl ActionContext {
    pub fn state(&self) -> ReadState {
        self.store.state()
    }

    pub fn commit(&self, name: &str, payload: Value) -> Result<()> {
        self.store.commit(name, payload)
    }

    pub fn dispatch(&self, name: &str, payload: Value) -> Result<ActionFuture> {
        self.store.dispatch(name, payload)
    }

    pub fn getter(&self, name: &str) -> Result<Value> {
        self.store.getter(name)
    }

    pub fn store(&self) -> &CentralStore {
        &self.store
    }
}
