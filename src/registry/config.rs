use serde::{Deserialize, Serialize};

/// What to do with user store members named like a built-in (`$patch`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedFieldPolicy {
    /// Drop the user member and log a warning; the built-in wins.
    #[default]
    Shadow,
    /// Fail the build with `StoreError::ReservedField`.
    Reject,
}

/// Registry settings.
///
/// Every field has a default, so a host can deserialize a partial config:
///
/// ```
/// use larder::{RegistryConfig, ReservedFieldPolicy};
///
/// let config: RegistryConfig =
///     serde_json::from_str(r#"{ "label": "app", "reserved_fields": "reject" }"#).unwrap();
/// assert_eq!(config.label, "app");
/// assert_eq!(config.reserved_fields, ReservedFieldPolicy::Reject);
/// assert!(config.warn_on_inert_writes);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Name attached to the registry's log events.
    pub label: String,
    pub reserved_fields: ReservedFieldPolicy,
    /// Log a warning when a disposed store is written to or acted on.
    pub warn_on_inert_writes: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            label: "default".to_string(),
            reserved_fields: ReservedFieldPolicy::default(),
            warn_on_inert_writes: true,
        }
    }
}

impl RegistryConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_reserved_fields(mut self, policy: ReservedFieldPolicy) -> Self {
        self.reserved_fields = policy;
        self
    }

    pub fn with_warn_on_inert_writes(mut self, warn: bool) -> Self {
        self.warn_on_inert_writes = warn;
        self
    }
}
