use crate::runtime::ReactiveRuntime;
use std::sync::Arc;

/// A side effect that runs when its dependencies change.
///
/// Effects automatically track signal reads and re-run when those signals change.
/// The effect runs immediately on creation to establish initial dependencies.
///
/// An effect created while a [`Scope`](crate::Scope) runs is owned by that
/// scope and lives until the scope stops. Otherwise it lives as long as the
/// returned handle.
///
/// # Examples
///
/// ```
/// use larder::{Effect, Signal};
/// use std::sync::{Arc, atomic::{AtomicI32, Ordering}};
///
/// let signal = Signal::new(5);
/// let last_value = Arc::new(AtomicI32::new(0));
/// let last_value_clone = last_value.clone();
///
/// let _effect = Effect::new({
///     let signal = signal.clone();
///     move || {
///         let val = signal.get();
///         last_value_clone.store(val, Ordering::SeqCst);
///     }
/// });
///
/// assert_eq!(last_value.load(Ordering::SeqCst), 5);
///
/// signal.set(10);
/// assert_eq!(last_value.load(Ordering::SeqCst), 10);
/// ```
pub struct Effect {
    id: usize,
    scoped: bool,
}

impl Effect {
    /// Create a new effect that runs when dependencies change.
    pub fn new<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::global();
        let id = runtime.next_id();
        let effect = Arc::new(effect);
        let effect_clone = Arc::clone(&effect);

        // Register the effect with the runtime
        let scoped = runtime.create_observer(id, move || {
            effect_clone();
        });

        // Run immediately within the observer context to track dependencies
        runtime.with_observer(id, || {
            effect();
        });

        Self { id, scoped }
    }

    /// Stop the effect regardless of scope ownership.
    pub fn stop(&self) {
        ReactiveRuntime::global().remove_observer(self.id);
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if !self.scoped {
            ReactiveRuntime::global().remove_observer(self.id);
        }
    }
}

/// Create a new effect that runs when dependencies change.
///
/// The effect runs immediately and then again whenever any signal
/// it reads changes.
///
/// # Example
///
/// ```
/// use larder::{create_effect, Signal};
///
/// let count = Signal::new(0);
///
/// let _effect = create_effect({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
/// ```
pub fn create_effect<F>(effect: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn effect_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let _effect = create_effect(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_unscoped_effect_stops() {
        let signal = Signal::new(0);
        let counter = Arc::new(AtomicUsize::new(0));

        let effect = create_effect({
            let signal = signal.clone();
            let counter = counter.clone();
            move || {
                let _ = signal.get();
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        signal.set(1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        drop(effect);
        signal.set(2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
