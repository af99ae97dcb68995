use crate::runtime::{MemoState, ReactiveRuntime};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct MemoInner<T> {
    id: usize,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    cached: RwLock<Option<T>>,
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        ReactiveRuntime::global().release(self.id);
    }
}

/// A memoized computed value that automatically tracks dependencies.
///
/// Memos compute lazily on first read and only recompute when a source read
/// during the last evaluation has been written since. A memo created inside a
/// [`Scope`](crate::Scope) freezes at its last value once that scope stops.
pub struct Memo<T> {
    inner: Arc<MemoInner<T>>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::global();
        let id = runtime.next_id();

        // Register this as a memo with the runtime
        runtime.register_memo(id);

        Self {
            inner: Arc::new(MemoInner {
                id,
                compute: Box::new(compute),
                cached: RwLock::new(None),
            }),
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Read the memoized value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let runtime = ReactiveRuntime::global();
        runtime.track_read(self.inner.id);

        match runtime.memo_state(self.inner.id) {
            MemoState::Clean => {}
            MemoState::Dirty => {
                runtime.clear_dependencies(self.inner.id);
                // Recompute within observer context to track dependencies
                let value = runtime.with_observer(self.inner.id, || (self.inner.compute)());
                *self.inner.cached.write() = Some(value);
                runtime.mark_memo_clean(self.inner.id);
            }
            MemoState::Stopped => {
                if self.inner.cached.read().is_none() {
                    let value = runtime.untracked(|| (self.inner.compute)());
                    *self.inner.cached.write() = Some(value);
                }
            }
        }

        let cached = self.inner.cached.read();
        match cached.as_ref() {
            Some(value) => f(value),
            None => {
                drop(cached);
                let value = runtime.untracked(|| (self.inner.compute)());
                f(&value)
            }
        }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo").field("id", &self.inner.id).finish()
    }
}

/// Create a new memoized computation.
///
/// # Example
///
/// ```
/// use larder::{create_memo, Signal};
///
/// let count = Signal::new(5);
/// let doubled = create_memo({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Memo::new(compute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn memo_basic() {
        let count = Signal::new(5);
        let doubled = create_memo({
            let count = count.clone();
            move || count.get() * 2
        });

        assert_eq!(doubled.get(), 10);

        count.set(10);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn memo_runs_once_between_writes() {
        let count = Signal::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let doubled = create_memo({
            let count = count.clone();
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                count.get() * 2
            }
        });

        for _ in 0..5 {
            assert_eq!(doubled.get(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        count.set(3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(doubled.get(), 6);
        assert_eq!(doubled.get(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn memo_chain_propagates() {
        let input = Signal::new(1);
        let doubled = create_memo({
            let input = input.clone();
            move || input.get() * 2
        });
        let quadrupled = create_memo({
            let doubled = doubled.clone();
            move || doubled.get() * 2
        });

        assert_eq!(quadrupled.get(), 4);
        input.set(5);
        assert_eq!(quadrupled.get(), 20);
    }
}
