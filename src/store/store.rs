use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::definition::{ActionFn, StateFactory};
use super::listeners::{
    ActionCall, ActionHooks, Listeners, MutationEvent, MutationKind, Subscriber, Subscription,
};
use super::state::StateSlice;
use crate::error::{Result, StoreError};
use crate::registry::{Registry, RegistryInner};
use crate::runtime::{batch, Scope};
use crate::signal::{Memo, Signal};

/// Names of the built-in store members. User fields with these names are
/// shadowed by the built-ins.
pub const RESERVED_FIELDS: [&str; 6] = [
    "$id",
    "$patch",
    "$dispose",
    "$reset",
    "$onAction",
    "$subscribe",
];

/// One named member of a composed store.
#[derive(Clone)]
pub enum Field {
    State(Signal<Value>),
    Getter(Memo<Value>),
    Action(ActionFn),
    Constant(Value),
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::State(signal) => f.debug_tuple("State").field(&signal.id()).finish(),
            Field::Getter(memo) => f.debug_tuple("Getter").field(&memo.id()).finish(),
            Field::Action(_) => f.write_str("Action"),
            Field::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// State patch accepted by [`Store::patch`].
pub enum Patch {
    /// Mutator applied to the store's state slice.
    Function(Box<dyn FnOnce(&StateSlice)>),
    /// Partial-object merge. Not supported; rejected with
    /// [`StoreError::UnsupportedPatch`].
    Object(Value),
}

impl Patch {
    pub fn with(f: impl FnOnce(&StateSlice) + 'static) -> Self {
        Patch::Function(Box::new(f))
    }
}

pub(crate) enum StoreKind {
    Options { state: Option<StateFactory> },
    Setup,
}

struct StoreInner {
    id: String,
    registry: Weak<RegistryInner>,
    state: StateSlice,
    fields: BTreeMap<String, Field>,
    scope: Scope,
    kind: StoreKind,
    warn_on_inert_writes: bool,
    disposed: AtomicBool,
    subscribers: Listeners<Subscriber>,
    action_hooks: Listeners<ActionHooks>,
}

/// A composed store: state fields, getters, actions and control methods
/// behind one shared handle.
///
/// Handles are cheap to clone; every clone refers to the same instance, and
/// [`Store::ptr_eq`] tells whether two handles are the same instance.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning handle to a store, held by its own getters.
#[derive(Clone)]
pub(crate) struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

pub(crate) struct StoreParts {
    pub id: String,
    pub registry: Weak<RegistryInner>,
    pub state: StateSlice,
    pub fields: BTreeMap<String, Field>,
    pub scope: Scope,
    pub kind: StoreKind,
    pub warn_on_inert_writes: bool,
}

impl Store {
    pub(crate) fn from_parts(parts: StoreParts) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                id: parts.id,
                registry: parts.registry,
                state: parts.state,
                fields: parts.fields,
                scope: parts.scope,
                kind: parts.kind,
                warn_on_inert_writes: parts.warn_on_inert_writes,
                disposed: AtomicBool::new(false),
                subscribers: Listeners::new(),
                action_hooks: Listeners::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The store identifier (`$id`).
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The store's state slice.
    pub fn state(&self) -> StateSlice {
        self.inner.state.clone()
    }

    /// The registry this store was built in, while it is still alive.
    pub fn registry(&self) -> Option<Registry> {
        self.inner.registry.upgrade().map(Registry::from_inner)
    }

    pub(crate) fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Names of user-defined members.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.inner.fields.keys().map(String::as_str)
    }

    pub fn has_action(&self, name: &str) -> bool {
        matches!(self.inner.fields.get(name), Some(Field::Action(_)))
    }

    /// Read a member by name: `$id`, a state field, a getter or a constant.
    /// Reads of state fields and getters are tracked.
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == "$id" {
            return Some(Value::String(self.inner.id.clone()));
        }
        match self.inner.fields.get(name)? {
            Field::State(signal) => Some(signal.get()),
            Field::Getter(memo) => Some(memo.get()),
            Field::Constant(value) => Some(value.clone()),
            Field::Action(_) => None,
        }
    }

    /// Read a member by name and decode it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| StoreError::UnknownField {
            store: self.inner.id.clone(),
            field: name.to_string(),
        })?;
        serde_json::from_value(value).map_err(|source| StoreError::InvalidStateValue {
            field: name.to_string(),
            source,
        })
    }

    /// Write one state field directly.
    pub fn set(&self, field: &str, value: Value) -> Result<()> {
        self.warn_if_disposed("set");
        self.inner.state.set(field, value)?;
        self.notify(MutationKind::Direct {
            field: field.to_string(),
        });
        Ok(())
    }

    /// Invoke an action with the store as its context.
    ///
    /// Writes made by the action are batched. Subscribers get one
    /// [`MutationKind::Action`] event if any state field changed.
    pub fn call(&self, name: &str, payload: Value) -> Result<Value> {
        let Some(Field::Action(action)) = self.inner.fields.get(name) else {
            return Err(StoreError::UnknownAction(name.to_string()));
        };
        self.warn_if_disposed("call");
        tracing::trace!(store = %self.inner.id, action = name, "action called");

        let hooks = self.inner.action_hooks.snapshot();
        if hooks.is_empty() {
            return self.run_action(name, action, payload);
        }

        let call = ActionCall {
            store_id: self.inner.id.clone(),
            name: name.to_string(),
            payload: payload.clone(),
        };
        for hook in &hooks {
            hook.run_before(&call);
        }
        let result = self.run_action(name, action, payload);
        match &result {
            Ok(value) => hooks.iter().for_each(|hook| hook.run_after(&call, value)),
            Err(err) => hooks.iter().for_each(|hook| hook.run_on_error(&call, err)),
        }
        result
    }

    /// Apply a patch to the state (`$patch`).
    ///
    /// Writes made by the mutator are batched: effects depending on the
    /// state re-run once after it returns, and subscribers are notified once.
    pub fn patch(&self, patch: Patch) -> Result<()> {
        let mutator = match patch {
            Patch::Function(mutator) => mutator,
            Patch::Object(_) => return Err(StoreError::UnsupportedPatch),
        };
        self.warn_if_disposed("patch");
        tracing::trace!(store = %self.inner.id, "patch applied");

        let state = &self.inner.state;
        batch(|| mutator(state));
        self.notify(MutationKind::PatchFunction);
        Ok(())
    }

    /// Shorthand for `patch(Patch::with(f))`.
    pub fn patch_with(&self, f: impl FnOnce(&StateSlice) + 'static) -> Result<()> {
        self.patch(Patch::with(f))
    }

    /// Restore the state produced by the state factory (`$reset`).
    ///
    /// Only stores defined with options know their initial state; setup
    /// stores fail with [`StoreError::NotImplemented`].
    pub fn reset(&self) -> Result<()> {
        let StoreKind::Options { state } = &self.inner.kind else {
            return Err(StoreError::NotImplemented {
                store: self.inner.id.clone(),
                method: "$reset",
            });
        };
        self.warn_if_disposed("reset");
        if let Some(factory) = state {
            let initial = factory();
            batch(|| self.inner.state.assign(initial))?;
        }
        self.notify(MutationKind::Reset);
        Ok(())
    }

    /// Register a callback run after every direct write, action that changed
    /// state, patch and reset (`$subscribe`). Subscriptions end when the store is disposed.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&MutationEvent, &Value) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(f))
    }

    /// Register hooks run around every action call (`$onAction`).
    pub fn on_action(&self, hooks: ActionHooks) -> Subscription {
        self.inner.action_hooks.add(Arc::new(hooks))
    }

    /// Tear the store down (`$dispose`).
    ///
    /// Stops every memo and effect created while the store was built, drops
    /// its listeners and removes it from its registry. The next `use_store`
    /// builds a fresh instance. Calling it again is a no-op.
    pub fn dispose(&self) {
        if !self.release() {
            return;
        }
        if let Some(registry) = self.registry() {
            registry.remove_instance(self);
        }
        tracing::debug!(store = %self.inner.id, "store disposed");
    }

    /// Stop the scope and listeners. Returns false if already disposed.
    pub(crate) fn release(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.scope.stop();
        self.inner.subscribers.clear();
        self.inner.action_hooks.clear();
        true
    }

    /// Run an action batched; subscribers hear about it once if it changed
    /// any state field, whether or not it succeeded.
    fn run_action(&self, name: &str, action: &ActionFn, payload: Value) -> Result<Value> {
        let before = (!self.inner.subscribers.is_empty()).then(|| self.inner.state.snapshot());
        let result = batch(|| action(self, payload));
        if let Some(before) = before {
            if self.inner.state.snapshot() != before {
                self.notify(MutationKind::Action {
                    name: name.to_string(),
                });
            }
        }
        result
    }

    fn notify(&self, kind: MutationKind) {
        if self.inner.subscribers.is_empty() {
            return;
        }
        let event = MutationEvent {
            store_id: self.inner.id.clone(),
            kind,
        };
        let snapshot = self.inner.state.snapshot();
        for subscriber in self.inner.subscribers.snapshot() {
            subscriber(&event, &snapshot);
        }
    }

    fn warn_if_disposed(&self, operation: &str) {
        if self.inner.warn_on_inert_writes && self.is_disposed() {
            tracing::warn!(
                store = %self.inner.id,
                operation,
                "store is disposed; its getters will not observe this write"
            );
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.snapshot())
            .field("fields", &self.inner.fields)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
