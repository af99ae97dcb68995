//! Helpers that bind central-store members to accessors keyed by name.
//!
//! Each helper takes an ordered list of names and returns name → accessor.
//! Accessors resolve the store installed above the component they are given.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::store::{ActionFuture, CentralStore};
use crate::error::{Result, StoreError};
use crate::host::Component;

pub type StateAccessor = Arc<dyn Fn(&Component) -> Result<Value> + Send + Sync>;
pub type GetterAccessor = Arc<dyn Fn(&Component) -> Result<Value> + Send + Sync>;
pub type MutationAccessor = Arc<dyn Fn(&Component, Value) -> Result<()> + Send + Sync>;
pub type ActionAccessor = Arc<dyn Fn(&Component, Value) -> Result<ActionFuture> + Send + Sync>;

/// Input accepted by the mapping helpers: an ordered list of names.
pub trait IntoNames {
    fn into_names(self) -> Result<Vec<String>>;
}

impl IntoNames for &[&str] {
    fn into_names(self) -> Result<Vec<String>> {
        Ok(self.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> IntoNames for [&str; N] {
    fn into_names(self) -> Result<Vec<String>> {
        self.as_slice().into_names()
    }
}

impl<const N: usize> IntoNames for &[&str; N] {
    fn into_names(self) -> Result<Vec<String>> {
        self.as_slice().into_names()
    }
}

impl IntoNames for Vec<&str> {
    fn into_names(self) -> Result<Vec<String>> {
        self.as_slice().into_names()
    }
}

impl IntoNames for Vec<String> {
    fn into_names(self) -> Result<Vec<String>> {
        Ok(self)
    }
}

impl IntoNames for &Value {
    fn into_names(self) -> Result<Vec<String>> {
        let Value::Array(items) = self else {
            return Err(StoreError::InvalidArgument(format!(
                "expected an ordered list of names, got {}",
                kind(self)
            )));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(name) => Ok(name.clone()),
                other => Err(StoreError::InvalidArgument(format!(
                    "expected a list of strings, found {}",
                    kind(other)
                ))),
            })
            .collect()
    }
}

impl IntoNames for Value {
    fn into_names(self) -> Result<Vec<String>> {
        (&self).into_names()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn map_names<A>(
    names: impl IntoNames,
    accessor: impl Fn(String) -> A,
) -> Result<BTreeMap<String, A>> {
    Ok(names
        .into_names()?
        .into_iter()
        .map(|name| (name.clone(), accessor(name)))
        .collect())
}

/// Accessors reading state fields; a missing field reads as `null`.
///
/// ```
/// use larder::{map_state, CentralOptions, CentralStore, Component};
/// use serde_json::json;
///
/// let root = Component::root();
/// CentralStore::new(CentralOptions::new().state(json!({ "count": 3 })))
///     .unwrap()
///     .install(&root);
///
/// let computed = map_state(["count"]).unwrap();
/// assert_eq!(computed["count"](&root.child()).unwrap(), json!(3));
///
/// assert!(map_state(&json!({ "a": 1 })).is_err());
/// ```
pub fn map_state(names: impl IntoNames) -> Result<BTreeMap<String, StateAccessor>> {
    map_names(names, |name| -> StateAccessor {
        Arc::new(move |component: &Component| {
            let store = CentralStore::of(component)?;
            Ok(store.state().get(&name).unwrap_or(Value::Null))
        })
    })
}

/// Accessors evaluating getters.
pub fn map_getters(names: impl IntoNames) -> Result<BTreeMap<String, GetterAccessor>> {
    map_names(names, |name| -> GetterAccessor {
        Arc::new(move |component: &Component| {
            CentralStore::of(component)?.getter(&name)
        })
    })
}

/// Accessors committing mutations.
pub fn map_mutations(names: impl IntoNames) -> Result<BTreeMap<String, MutationAccessor>> {
    map_names(names, |name| -> MutationAccessor {
        Arc::new(move |component: &Component, payload: Value| {
            CentralStore::of(component)?.commit(&name, payload)
        })
    })
}

/// Accessors dispatching actions.
pub fn map_actions(names: impl IntoNames) -> Result<BTreeMap<String, ActionAccessor>> {
    map_names(names, |name| -> ActionAccessor {
        Arc::new(move |component: &Component, payload: Value| {
            CentralStore::of(component)?.dispatch(&name, payload)
        })
    })
}
