//! Error types for larder

use thiserror::Error;

/// Boxed error returned by user actions and mutations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by registries, stores and the central store.
#[derive(Error, Debug)]
pub enum StoreError {
    // Lookup errors
    #[error("no active registry: install a registry or pass one explicitly")]
    NoActiveRegistry,

    #[error("registry has been torn down")]
    RegistryStopped,

    #[error("store `{0}` requested itself while being built")]
    CircularBuild(String),

    #[error("no central store installed in this component tree")]
    NoStoreInstalled,

    // Dispatch errors
    #[error("unknown mutation: {0}")]
    UnknownMutation(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown getter: {0}")]
    UnknownGetter(String),

    // State errors
    #[error("store `{store}` has no state field `{field}`")]
    UnknownField { store: String, field: String },

    #[error("invalid value for state field `{field}`: {source}")]
    InvalidStateValue {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("object patches are not supported, pass a mutator function")]
    UnsupportedPatch,

    // Definition errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid plugin: {0}")]
    InvalidPlugin(String),

    #[error("store `{store}` defines reserved field `{field}`")]
    ReservedField { store: String, field: String },

    #[error("store `{store}` does not implement {method}")]
    NotImplemented { store: String, method: &'static str },

    /// Failure reported by user code, passed through untouched.
    #[error("{0}")]
    Action(BoxError),
}

impl StoreError {
    /// Wrap a user error so it can be returned from an action or mutation.
    pub fn action(err: impl Into<BoxError>) -> Self {
        StoreError::Action(err.into())
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_errors_keep_their_message() {
        let err = StoreError::action("network unreachable");
        assert_eq!(err.to_string(), "network unreachable");
    }

    #[test]
    fn unknown_field_names_store_and_field() {
        let err = StoreError::UnknownField {
            store: "counter".into(),
            field: "missing".into(),
        };
        assert_eq!(err.to_string(), "store `counter` has no state field `missing`");
    }
}
