use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::error::StoreError;

/// What caused a state change reported to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationKind {
    /// A single field written through `Store::set`.
    Direct { field: String },
    /// An action ran and changed at least one state field.
    Action { name: String },
    /// A `patch` mutator ran.
    PatchFunction,
    /// `reset` restored the initial state.
    Reset,
    /// A named mutation was committed on a central store.
    Commit { name: String, payload: Value },
}

/// Change notification delivered to store subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationEvent {
    pub store_id: String,
    pub kind: MutationKind,
}

/// Callback registered through `subscribe`; receives the event and a state
/// snapshot taken after the change.
pub type Subscriber = dyn Fn(&MutationEvent, &Value) + Send + Sync;

/// One action invocation, as seen by action hooks.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionCall {
    pub store_id: String,
    pub name: String,
    pub payload: Value,
}

type BeforeHook = Box<dyn Fn(&ActionCall) + Send + Sync>;
type AfterHook = Box<dyn Fn(&ActionCall, &Value) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&ActionCall, &StoreError) + Send + Sync>;

/// Callbacks run around every action call of a store.
///
/// ```
/// use larder::ActionHooks;
///
/// let hooks = ActionHooks::new()
///     .before(|call| println!("-> {}", call.name))
///     .after(|call, result| println!("<- {} = {result}", call.name))
///     .on_error(|call, err| eprintln!("!! {}: {err}", call.name));
/// # drop(hooks);
/// ```
#[derive(Default)]
pub struct ActionHooks {
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
    on_error: Option<ErrorHook>,
}

impl ActionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, f: impl Fn(&ActionCall) + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(f));
        self
    }

    pub fn after(mut self, f: impl Fn(&ActionCall, &Value) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(f));
        self
    }

    pub fn on_error(
        mut self,
        f: impl Fn(&ActionCall, &StoreError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn run_before(&self, call: &ActionCall) {
        if let Some(before) = &self.before {
            before(call);
        }
    }

    pub(crate) fn run_after(&self, call: &ActionCall, result: &Value) {
        if let Some(after) = &self.after {
            after(call, result);
        }
    }

    pub(crate) fn run_on_error(&self, call: &ActionCall, err: &StoreError) {
        if let Some(on_error) = &self.on_error {
            on_error(call, err);
        }
    }
}

type Entries<F> = RwLock<Vec<(usize, Arc<F>)>>;

/// Ordered list of callbacks that can be removed by id.
pub(crate) struct Listeners<F: ?Sized> {
    next_id: AtomicUsize,
    entries: Arc<Entries<F>>,
}

impl<F: ?Sized + Send + Sync + 'static> Listeners<F> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub(crate) fn add(&self, listener: Arc<F>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.write().push((id, listener));
        let entries: Weak<Entries<F>> = Arc::downgrade(&self.entries);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    entries.write().retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Current listeners, cloned out so none of them runs under the lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Handle returned by `subscribe` and `on_action`.
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
