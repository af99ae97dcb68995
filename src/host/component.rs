use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::runtime::ReactiveRuntime;

type Provided = Arc<dyn Any + Send + Sync>;

struct ComponentInner {
    id: usize,
    parent: Option<Component>,
    provides: RwLock<HashMap<TypeId, Provided>>,
}

thread_local! {
    static CURRENT: RefCell<Vec<Component>> = const { RefCell::new(Vec::new()) };
}

struct CurrentFrame;

impl Drop for CurrentFrame {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// A node in a host component tree.
///
/// Values are provided by type and injected by any descendant, so a registry
/// or a central store installed on the root is visible everywhere below it.
///
/// # Examples
///
/// ```
/// use larder::Component;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Theme(&'static str);
///
/// let root = Component::root();
/// root.provide(Theme("dark"));
///
/// let leaf = root.child().child();
/// assert_eq!(leaf.inject::<Theme>(), Some(Theme("dark")));
/// ```
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl Component {
    fn with_parent(parent: Option<Component>) -> Self {
        Self {
            inner: Arc::new(ComponentInner {
                id: ReactiveRuntime::global().next_id(),
                parent,
                provides: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a tree root.
    pub fn root() -> Self {
        Self::with_parent(None)
    }

    /// Create a child of this component.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    pub fn parent(&self) -> Option<&Component> {
        self.inner.parent.as_ref()
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Make `value` available to this component and its descendants.
    /// Providing the same type again replaces the previous value.
    pub fn provide<T>(&self, value: T)
    where
        T: Any + Send + Sync,
    {
        self.inner
            .provides
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Look up the nearest provided value of type `T`, starting at this
    /// component and walking towards the root.
    pub fn inject<T>(&self) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        let mut node = Some(self);
        while let Some(component) = node {
            let provided = component
                .inner
                .provides
                .read()
                .get(&TypeId::of::<T>())
                .cloned();
            if let Some(value) = provided {
                return value.downcast_ref::<T>().cloned();
            }
            node = component.parent();
        }
        None
    }

    /// Run `f` with this component as the current one on this thread.
    pub fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT.with(|stack| stack.borrow_mut().push(self.clone()));
        let _frame = CurrentFrame;
        f()
    }

    /// The component currently running on this thread, if any.
    pub fn current() -> Option<Component> {
        CURRENT.with(|stack| stack.borrow().last().cloned())
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.inner.id)
            .field("parent", &self.parent().map(Component::id))
            .finish()
    }
}
