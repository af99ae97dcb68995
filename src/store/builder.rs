use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::definition::{DefinitionKind, StoreDefinition};
use super::state::StateSlice;
use super::store::{Field, Store, StoreKind, StoreParts, WeakStore, RESERVED_FIELDS};
use crate::error::{Result, StoreError};
use crate::registry::{Registry, ReservedFieldPolicy};
use crate::runtime::Scope;
use crate::signal::create_memo;

struct SetupOutput {
    state: StateSlice,
    fields: Vec<(String, Field)>,
}

/// Compose a store for `definition`.
///
/// The setup runs inside a fresh scope nested under the registry's root
/// scope. Registration and plugins are left to the caller.
pub(crate) fn build(registry: &Registry, definition: &StoreDefinition) -> Result<Store> {
    let id = definition.id();
    let owner: Arc<OnceLock<WeakStore>> = Arc::new(OnceLock::new());
    let (scope, output) = registry
        .root_scope()
        .run(|| {
            let scope = Scope::new(false);
            let output = scope.run(|| run_setup(registry, definition, &owner));
            (scope, output)
        })
        .ok_or(StoreError::RegistryStopped)?;

    let output = match output {
        Some(Ok(output)) => output,
        Some(Err(err)) => {
            scope.stop();
            return Err(err);
        }
        None => return Err(StoreError::RegistryStopped),
    };

    let fields = match merge_fields(id, output.fields, registry.config().reserved_fields) {
        Ok(fields) => fields,
        Err(err) => {
            scope.stop();
            return Err(err);
        }
    };

    let kind = match &definition.kind {
        DefinitionKind::Options { state, .. } => StoreKind::Options {
            state: state.clone(),
        },
        DefinitionKind::Setup(_) => StoreKind::Setup,
    };

    let store = Store::from_parts(StoreParts {
        id: id.to_string(),
        registry: registry.downgrade(),
        state: output.state,
        fields,
        scope,
        kind,
        warn_on_inert_writes: registry.config().warn_on_inert_writes,
    });
    let _ = owner.set(store.downgrade());
    Ok(store)
}

fn run_setup(
    registry: &Registry,
    definition: &StoreDefinition,
    owner: &Arc<OnceLock<WeakStore>>,
) -> Result<SetupOutput> {
    let id = definition.id();
    match &definition.kind {
        DefinitionKind::Options {
            state,
            getters,
            actions,
        } => {
            let initial = match state {
                Some(factory) => factory(),
                None => Value::Object(Map::new()),
            };
            let state = StateSlice::from_value(id, initial)?;
            registry.set_root_slice(id, state.clone());

            let mut fields: Vec<(String, Field)> = state
                .keys()
                .filter_map(|key| {
                    let signal = state.signal(key)?.clone();
                    Some((key.to_string(), Field::State(signal)))
                })
                .collect();

            for (name, action) in actions {
                fields.push((name.clone(), Field::Action(action.clone())));
            }

            // Getters evaluate against the composed store (actions included)
            // they belong to, which is filled in once the store exists.
            for (name, getter) in getters {
                let owner = Arc::clone(owner);
                let getter = getter.clone();
                let memo = create_memo(move || match owner.get().and_then(WeakStore::upgrade) {
                    Some(store) => getter(&store),
                    None => Value::Null,
                });
                fields.push((name.clone(), Field::Getter(memo)));
            }

            Ok(SetupOutput { state, fields })
        }
        DefinitionKind::Setup(setup) => {
            let setup_fields = setup(registry)?;
            let signals: BTreeMap<_, _> = setup_fields
                .fields
                .iter()
                .filter_map(|(name, field)| match field {
                    Field::State(signal) => Some((name.clone(), signal.clone())),
                    _ => None,
                })
                .collect();
            let state = StateSlice::from_signals(id, signals);
            registry.set_root_slice(id, state.clone());
            Ok(SetupOutput {
                state,
                fields: setup_fields.fields,
            })
        }
    }
}

/// Merge user members; later entries win, built-in names always win.
fn merge_fields(
    store_id: &str,
    fields: Vec<(String, Field)>,
    policy: ReservedFieldPolicy,
) -> Result<BTreeMap<String, Field>> {
    let mut merged = BTreeMap::new();
    for (name, field) in fields {
        if RESERVED_FIELDS.contains(&name.as_str()) {
            match policy {
                ReservedFieldPolicy::Shadow => {
                    tracing::warn!(
                        store = store_id,
                        field = %name,
                        "field shadowed by a built-in store member"
                    );
                    continue;
                }
                ReservedFieldPolicy::Reject => {
                    return Err(StoreError::ReservedField {
                        store: store_id.to_string(),
                        field: name,
                    });
                }
            }
        }
        if merged.insert(name.clone(), field).is_some() {
            tracing::warn!(
                store = store_id,
                field = %name,
                "field replaced by a later member with the same name"
            );
        }
    }
    Ok(merged)
}
