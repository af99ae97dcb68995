use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct SignalInner<T> {
    id: usize,
    value: RwLock<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        ReactiveRuntime::global().release(self.id);
    }
}

/// A reactive signal that holds a value and notifies subscribers when changed.
///
/// Cloning a signal yields another handle to the same value.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(initial: T) -> Self {
        let id = ReactiveRuntime::global().next_id();

        Self {
            inner: Arc::new(SignalInner {
                id,
                value: RwLock::new(initial),
            }),
        }
    }

    /// Get the current value of the signal.
    pub fn get(&self) -> T {
        ReactiveRuntime::global().track_read(self.inner.id);
        self.inner.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value for the signal.
    pub fn set(&self, new_value: T) {
        *self.inner.value.write() = new_value;
        ReactiveRuntime::global().notify_observers(self.inner.id);
    }

    /// Update the value using a function.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.inner.value.write();
        f(&mut *value);
        drop(value); // Release the write lock before notifying
        ReactiveRuntime::global().notify_observers(self.inner.id);
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveRuntime::global().track_read(self.inner.id);
        let value = self.inner.value.read();
        f(&*value)
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Whether both handles point at the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .finish()
    }
}
