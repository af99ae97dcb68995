use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use super::scope::Scope;

type ObserverFn = Arc<dyn Fn() + Send + Sync>;

/// Cache state of a memo tracked by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoState {
    Dirty,
    Clean,
    /// The owning scope was stopped; the memo keeps its last value forever.
    Stopped,
}

/// Shared dependency graph.
struct ReactiveContext {
    // Map from source ID (signal or memo) to set of observer IDs that depend on it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to set of source IDs it depends on
    observer_deps: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to the effect function
    observers: HashMap<usize, ObserverFn>,
    memos: HashMap<usize, MemoState>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            dependencies: HashMap::new(),
            observer_deps: HashMap::new(),
            observers: HashMap::new(),
            memos: HashMap::new(),
        }
    }

    fn clear_observer_deps(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                }
            }
        }
    }
}

#[derive(Default)]
struct Batch {
    depth: usize,
    pending: Vec<usize>,
}

// Tracking state is per thread so concurrent threads never attribute reads
// to each other's observers.
thread_local! {
    static OBSERVER_STACK: RefCell<Vec<Option<usize>>> = const { RefCell::new(Vec::new()) };
    static BATCH: RefCell<Batch> = RefCell::new(Batch::default());
}

/// Pops the observer stack even if the tracked function panics.
struct ObserverFrame;

impl ObserverFrame {
    fn push(observer: Option<usize>) -> Self {
        OBSERVER_STACK.with(|stack| stack.borrow_mut().push(observer));
        ObserverFrame
    }
}

impl Drop for ObserverFrame {
    fn drop(&mut self) {
        OBSERVER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Process-wide reactive runtime.
///
/// The runtime tracks dependencies between signals, memos and effects and
/// manages the reactive graph. Every primitive registers itself here on
/// creation and unregisters on drop.
///
/// # Examples
///
/// ```
/// use larder::Signal;
///
/// let signal = Signal::new(42);
/// assert_eq!(signal.get(), 42);
/// ```
pub struct ReactiveRuntime {
    next_id: AtomicUsize,
    context: Mutex<ReactiveContext>,
}

impl ReactiveRuntime {
    fn new() -> Self {
        ReactiveRuntime {
            next_id: AtomicUsize::new(0),
            context: Mutex::new(ReactiveContext::new()),
        }
    }

    /// Get the global runtime.
    pub fn global() -> &'static Self {
        static RUNTIME: OnceLock<ReactiveRuntime> = OnceLock::new();
        RUNTIME.get_or_init(Self::new)
    }

    /// Generate the next unique ID for a reactive primitive.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn current_observer() -> Option<usize> {
        OBSERVER_STACK.with(|stack| stack.borrow().last().copied().flatten())
    }

    /// Track a read of a source by the current observer.
    pub fn track_read(&self, source_id: usize) {
        let Some(current_observer) = Self::current_observer() else {
            return;
        };
        if current_observer == source_id {
            return;
        }
        let mut ctx = self.context.lock();
        ctx.dependencies
            .entry(source_id)
            .or_default()
            .insert(current_observer);
        ctx.observer_deps
            .entry(current_observer)
            .or_default()
            .insert(source_id);
    }

    /// Notify all observers that depend on a source.
    pub fn notify_observers(&self, source_id: usize) {
        let observers = {
            let ctx = self.context.lock();
            ctx.dependencies
                .get(&source_id)
                .map(|obs| obs.iter().copied().collect::<Vec<_>>())
        };

        if let Some(observers) = observers {
            for observer_id in observers {
                self.mark_observer_dirty(observer_id);
            }
        }
    }

    /// Mark an observer (memo or effect) as dirty and propagate to dependents.
    fn mark_observer_dirty(&self, observer_id: usize) {
        let mut ctx = self.context.lock();

        if let Some(state) = ctx.memos.get(&observer_id).copied() {
            if state != MemoState::Clean {
                return;
            }
            ctx.memos.insert(observer_id, MemoState::Dirty);
            let dependents = ctx
                .dependencies
                .get(&observer_id)
                .map(|deps| deps.iter().copied().collect::<Vec<_>>());
            drop(ctx);

            if let Some(dependents) = dependents {
                for dependent_id in dependents {
                    self.mark_observer_dirty(dependent_id);
                }
            }
            return;
        }

        let is_effect = ctx.observers.contains_key(&observer_id);
        drop(ctx);

        if is_effect {
            self.schedule(observer_id);
        }
    }

    fn schedule(&self, observer_id: usize) {
        let deferred = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            if batch.depth == 0 {
                return false;
            }
            if !batch.pending.contains(&observer_id) {
                batch.pending.push(observer_id);
            }
            true
        });
        if !deferred {
            self.run_observer(observer_id);
        }
    }

    /// Re-run an effect, re-tracking its dependencies from scratch.
    pub fn run_observer(&self, observer_id: usize) {
        let effect = {
            let mut ctx = self.context.lock();
            let effect = ctx.observers.get(&observer_id).cloned();
            if effect.is_some() {
                ctx.clear_observer_deps(observer_id);
            }
            effect
        };
        if let Some(effect) = effect {
            self.with_observer(observer_id, || effect());
        }
    }

    /// Register an effect function and attribute it to the current scope.
    /// Returns whether a scope took ownership of it.
    pub fn create_observer<F>(&self, observer_id: usize, f: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        {
            let mut ctx = self.context.lock();
            ctx.clear_observer_deps(observer_id);
            ctx.observers.insert(observer_id, Arc::new(f));
        }
        Scope::attach_observer(observer_id)
    }

    /// Stop an observer: drop its function and dependency edges.
    ///
    /// Memos are kept as `Stopped` so they return their last value without
    /// recomputing.
    pub fn remove_observer(&self, observer_id: usize) {
        let mut ctx = self.context.lock();
        ctx.observers.remove(&observer_id);
        ctx.clear_observer_deps(observer_id);
        if let Some(state) = ctx.memos.get_mut(&observer_id) {
            *state = MemoState::Stopped;
        }
    }

    /// Forget every trace of a dropped primitive.
    pub fn release(&self, id: usize) {
        let mut ctx = self.context.lock();
        ctx.observers.remove(&id);
        ctx.clear_observer_deps(id);
        ctx.memos.remove(&id);
        if let Some(dependents) = ctx.dependencies.remove(&id) {
            for dependent in dependents {
                if let Some(deps) = ctx.observer_deps.get_mut(&dependent) {
                    deps.remove(&id);
                }
            }
        }
    }

    /// Run a function with a specific observer as the current context.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _frame = ObserverFrame::push(Some(observer_id));
        f()
    }

    /// Run a function without tracking any reads.
    pub fn untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _frame = ObserverFrame::push(None);
        f()
    }

    /// Run a function with effect re-runs deferred until the outermost batch
    /// returns. Each pending effect runs once.
    pub fn batch<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        struct BatchFrame<'a>(&'a ReactiveRuntime);

        impl Drop for BatchFrame<'_> {
            fn drop(&mut self) {
                let pending = BATCH.with(|batch| {
                    let mut batch = batch.borrow_mut();
                    batch.depth -= 1;
                    if batch.depth == 0 {
                        std::mem::take(&mut batch.pending)
                    } else {
                        Vec::new()
                    }
                });
                for observer_id in pending {
                    self.0.run_observer(observer_id);
                }
            }
        }

        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        let _frame = BatchFrame(self);
        f()
    }

    /// Register a memo and mark it as dirty initially.
    pub fn register_memo(&self, memo_id: usize) {
        self.context.lock().memos.insert(memo_id, MemoState::Dirty);
        Scope::attach_observer(memo_id);
    }

    pub fn memo_state(&self, memo_id: usize) -> MemoState {
        self.context
            .lock()
            .memos
            .get(&memo_id)
            .copied()
            .unwrap_or(MemoState::Dirty)
    }

    /// Drop a memo's dependency edges ahead of recomputation.
    pub fn clear_dependencies(&self, memo_id: usize) {
        self.context.lock().clear_observer_deps(memo_id);
    }

    /// Mark a memo as clean (after recomputation). Stopped memos stay stopped.
    pub fn mark_memo_clean(&self, memo_id: usize) {
        let mut ctx = self.context.lock();
        if let Some(state) = ctx.memos.get_mut(&memo_id) {
            if *state == MemoState::Dirty {
                *state = MemoState::Clean;
            }
        }
    }
}

/// Run `f` with effect re-runs deferred until it returns.
///
/// ```
/// use larder::{batch, create_effect, Signal};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let a = Signal::new(1);
/// let b = Signal::new(2);
/// let runs = Arc::new(AtomicUsize::new(0));
/// let _effect = create_effect({
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     move || {
///         let _ = a.get() + b.get();
///         runs.fetch_add(1, Ordering::SeqCst);
///     }
/// });
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
/// ```
pub fn batch<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    ReactiveRuntime::global().batch(f)
}

/// Run `f` without registering any dependency for the current observer.
pub fn untrack<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    ReactiveRuntime::global().untracked(f)
}
