use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::context::ReactiveRuntime;

type Cleanup = Box<dyn FnOnce() + Send>;

struct ScopeInner {
    id: usize,
    active: AtomicBool,
    parent: Mutex<Option<Weak<ScopeInner>>>,
    observers: Mutex<Vec<usize>>,
    children: Mutex<Vec<Scope>>,
    cleanups: Mutex<Vec<Cleanup>>,
}

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

struct ScopeFrame;

impl Drop for ScopeFrame {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// A group of reactive subscriptions that can be stopped together.
///
/// Memos and effects created while a scope [`run`](Scope::run)s belong to it.
/// Scopes created inside another scope's `run` become its children unless
/// they are detached, and stopping a scope stops its whole subtree.
///
/// # Examples
///
/// ```
/// use larder::{create_effect, Scope, Signal};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let count = Signal::new(0);
/// let runs = Arc::new(AtomicUsize::new(0));
/// let scope = Scope::new(true);
///
/// scope.run(|| {
///     let count = count.clone();
///     let runs = runs.clone();
///     create_effect(move || {
///         let _ = count.get();
///         runs.fetch_add(1, Ordering::SeqCst);
///     });
/// });
///
/// count.set(1);
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
///
/// scope.stop();
/// count.set(2);
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create a scope. A non-detached scope created while another scope runs
    /// is stopped together with that parent.
    pub fn new(detached: bool) -> Self {
        let scope = Scope {
            inner: Arc::new(ScopeInner {
                id: ReactiveRuntime::global().next_id(),
                active: AtomicBool::new(true),
                parent: Mutex::new(None),
                observers: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
            }),
        };
        if !detached {
            if let Some(parent) = Scope::current() {
                parent.adopt(scope.clone());
            }
        }
        scope
    }

    /// The innermost scope currently running on this thread.
    pub fn current() -> Option<Scope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Run `f` with this scope collecting the subscriptions it creates.
    ///
    /// Returns `None` without running `f` once the scope has been stopped.
    pub fn run<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        if !self.is_active() {
            tracing::warn!(scope = self.inner.id, "cannot run an inactive scope");
            return None;
        }
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _frame = ScopeFrame;
        Some(f())
    }

    /// Register a callback to run when the scope stops.
    pub fn on_stop<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_active() {
            self.inner.cleanups.lock().push(Box::new(f));
        } else {
            f();
        }
    }

    /// Stop every subscription owned by this scope and its children.
    /// Idempotent.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.detach_from_parent();
        let runtime = ReactiveRuntime::global();
        let observers = std::mem::take(&mut *self.inner.observers.lock());
        for observer_id in observers {
            runtime.remove_observer(observer_id);
        }
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.stop();
        }
        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        for cleanup in cleanups {
            cleanup();
        }
        tracing::trace!(scope = self.inner.id, "scope stopped");
    }

    fn adopt(&self, child: Scope) {
        if self.is_active() {
            *child.inner.parent.lock() = Some(Arc::downgrade(&self.inner));
            self.inner.children.lock().push(child);
        } else {
            child.stop();
        }
    }

    /// A stopped scope no longer needs to be kept alive by its parent.
    fn detach_from_parent(&self) {
        let Some(parent) = self.inner.parent.lock().take().and_then(|p| p.upgrade()) else {
            return;
        };
        parent
            .children
            .lock()
            .retain(|child| !Arc::ptr_eq(&child.inner, &self.inner));
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }

    /// Attribute a newly created observer to the current scope, if any.
    pub(crate) fn attach_observer(observer_id: usize) -> bool {
        match Scope::current() {
            Some(scope) if scope.is_active() => {
                scope.inner.observers.lock().push(observer_id);
                true
            }
            _ => false,
        }
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{create_memo, Signal};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn nested_scope_stops_with_parent() {
        let parent = Scope::new(true);
        let child = parent.run(|| Scope::new(false)).unwrap();

        parent.stop();
        assert!(!child.is_active());
        assert!(child.run(|| ()).is_none());
    }

    #[test]
    fn detached_scope_survives_parent() {
        let parent = Scope::new(true);
        let detached = parent.run(|| Scope::new(true)).unwrap();

        parent.stop();
        assert!(detached.is_active());
    }

    #[test]
    fn stopped_memo_keeps_last_value() {
        let source = Signal::new(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = Scope::new(true);
        let doubled = scope
            .run(|| {
                let source = source.clone();
                let calls = calls.clone();
                create_memo(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    source.get() * 2
                })
            })
            .unwrap();

        assert_eq!(doubled.get(), 4);
        scope.stop();
        source.set(5);
        assert_eq!(doubled.get(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent_and_runs_cleanups_once() {
        let scope = Scope::new(true);
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counter = cleanups.clone();
        scope.on_stop(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scope.stop();
        scope.stop();
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stopped_children_are_released_by_parent() {
        let parent = Scope::new(true);
        let keep = parent.run(|| Scope::new(false)).unwrap();
        for _ in 0..100 {
            parent.run(|| Scope::new(false)).unwrap().stop();
        }

        assert_eq!(parent.child_count(), 1);
        parent.stop();
        assert!(!keep.is_active());
        assert_eq!(parent.child_count(), 0);
    }
}
