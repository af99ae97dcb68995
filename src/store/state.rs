use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::signal::Signal;

struct SliceInner {
    store_id: String,
    fields: BTreeMap<String, Signal<Value>>,
}

/// The state of one store: each top-level field lives in its own signal.
///
/// Reads through [`get`](StateSlice::get) are tracked, so memos and effects
/// that read a field re-run only when that field changes. The set of fields
/// is fixed when the slice is created.
#[derive(Clone)]
pub struct StateSlice {
    inner: Arc<SliceInner>,
}

impl StateSlice {
    /// Build a slice from a JSON object, one signal per key.
    pub fn from_value(store_id: impl Into<String>, value: Value) -> Result<Self> {
        let store_id = store_id.into();
        let Value::Object(object) = value else {
            return Err(StoreError::InvalidArgument(format!(
                "state of store `{store_id}` must be an object"
            )));
        };
        let fields = object
            .into_iter()
            .map(|(key, value)| (key, Signal::new(value)))
            .collect();
        Ok(Self {
            inner: Arc::new(SliceInner { store_id, fields }),
        })
    }

    /// Build a slice around existing signals.
    pub fn from_signals(
        store_id: impl Into<String>,
        fields: BTreeMap<String, Signal<Value>>,
    ) -> Self {
        Self {
            inner: Arc::new(SliceInner {
                store_id: store_id.into(),
                fields,
            }),
        }
    }

    pub fn store_id(&self) -> &str {
        &self.inner.store_id
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.fields.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.fields.keys().map(String::as_str)
    }

    /// The signal backing `field`.
    pub fn signal(&self, field: &str) -> Option<&Signal<Value>> {
        self.inner.fields.get(field)
    }

    fn field(&self, field: &str) -> Result<&Signal<Value>> {
        self.inner
            .fields
            .get(field)
            .ok_or_else(|| StoreError::UnknownField {
                store: self.inner.store_id.clone(),
                field: field.to_string(),
            })
    }

    /// Tracked read of a field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.fields.get(field).map(Signal::get)
    }

    /// Tracked read of a field decoded into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        let value = self.field(field)?.get();
        serde_json::from_value(value).map_err(|source| StoreError::InvalidStateValue {
            field: field.to_string(),
            source,
        })
    }

    pub fn set(&self, field: &str, value: Value) -> Result<()> {
        self.field(field)?.set(value);
        Ok(())
    }

    pub fn update(&self, field: &str, f: impl FnOnce(&mut Value)) -> Result<()> {
        self.field(field)?.update(f);
        Ok(())
    }

    /// Decode a field into `T`, mutate it, and write it back.
    ///
    /// ```
    /// use larder::StateSlice;
    /// use serde_json::json;
    ///
    /// let state = StateSlice::from_value("counter", json!({ "count": 1 })).unwrap();
    /// state.update_as::<i64>("count", |n| *n += 1).unwrap();
    /// assert_eq!(state.get("count"), Some(json!(2)));
    /// ```
    pub fn update_as<T>(&self, field: &str, f: impl FnOnce(&mut T)) -> Result<()>
    where
        T: DeserializeOwned + Serialize,
    {
        let signal = self.field(field)?;
        let invalid = |source: serde_json::Error| StoreError::InvalidStateValue {
            field: field.to_string(),
            source,
        };
        let mut decoded: T = serde_json::from_value(signal.get_untracked()).map_err(invalid)?;
        f(&mut decoded);
        signal.set(serde_json::to_value(decoded).map_err(invalid)?);
        Ok(())
    }

    /// Overwrite every field present in `value`; unknown keys are an error
    /// and nothing is written in that case.
    pub fn assign(&self, value: Value) -> Result<()> {
        let Value::Object(object) = value else {
            return Err(StoreError::InvalidArgument(format!(
                "state of store `{}` must be an object",
                self.inner.store_id
            )));
        };
        if let Some(unknown) = object.keys().find(|key| !self.contains(key)) {
            return Err(StoreError::UnknownField {
                store: self.inner.store_id.clone(),
                field: unknown.clone(),
            });
        }
        for (key, value) in object {
            self.field(&key)?.set(value);
        }
        Ok(())
    }

    /// Untracked JSON snapshot of every field.
    pub fn snapshot(&self) -> Value {
        let object: Map<String, Value> = self
            .inner
            .fields
            .iter()
            .map(|(key, signal)| (key.clone(), signal.get_untracked()))
            .collect();
        Value::Object(object)
    }

    /// A read-only view of this slice.
    pub fn read_only(&self) -> ReadState {
        ReadState(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StateSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSlice")
            .field("store_id", &self.inner.store_id)
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Read-only access to a state slice.
#[derive(Clone, Debug)]
pub struct ReadState(StateSlice);

impl ReadState {
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.get(field)
    }

    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        self.0.get_as(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys()
    }

    pub fn snapshot(&self) -> Value {
        self.0.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_state_is_rejected() {
        let err = StateSlice::from_value("broken", json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn fields_are_independent_signals() {
        let state = StateSlice::from_value("user", json!({ "name": "ada", "age": 36 })).unwrap();
        state.set("age", json!(37)).unwrap();

        assert_eq!(state.get("name"), Some(json!("ada")));
        assert_eq!(state.get_as::<u32>("age").unwrap(), 37);
        assert!(!state.signal("name").unwrap().ptr_eq(state.signal("age").unwrap()));
    }

    #[test]
    fn unknown_field_write_fails() {
        let state = StateSlice::from_value("user", json!({ "name": "ada" })).unwrap();
        let err = state.set("email", json!("a@b.c")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { ref field, .. } if field == "email"));
    }

    #[test]
    fn assign_is_all_or_nothing() {
        let state = StateSlice::from_value("user", json!({ "name": "ada", "age": 36 })).unwrap();
        assert!(state.assign(json!({ "age": 40, "email": "x" })).is_err());
        assert_eq!(state.get("age"), Some(json!(36)));

        state.assign(json!({ "age": 40 })).unwrap();
        assert_eq!(state.snapshot(), json!({ "name": "ada", "age": 40 }));
    }

    #[test]
    fn typed_update_reports_decode_errors() {
        let state = StateSlice::from_value("user", json!({ "name": "ada" })).unwrap();
        let err = state.update_as::<i64>("name", |n| *n += 1).unwrap_err();
        assert!(matches!(err, StoreError::InvalidStateValue { .. }));
    }
}
