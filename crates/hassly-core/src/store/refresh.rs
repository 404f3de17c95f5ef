// ── Snapshot application ──
//
// Decodes bootstrap results and incremental state changes and applies
// them to the RegistryStore. Registry results replace their mapping
// wholesale; config and services replace the whole document.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::RegistryStore;
use crate::error::CoreError;
use crate::model::{Area, Device, Entity, HubConfig, Label, RegistryKind, Services, State, StateChange};
use crate::signal::HubSignal;

/// What applying a `state_changed` event did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateApplied {
    Updated,
    Removed,
    /// The entity is not in the registry; nothing changed.
    UnknownEntity,
}

impl RegistryStore {
    /// Replace one registry with a list result. Returns the signal to emit.
    pub(crate) fn apply_registry(&self, kind: RegistryKind, result: Value) -> Result<HubSignal, CoreError> {
        let signal = match kind {
            RegistryKind::Devices => {
                let items: Vec<Device> = decode_list(kind.command(), result)?;
                self.devices
                    .replace_all(items.into_iter().map(|d| (d.id.clone(), d)).collect());
                HubSignal::Devices(self.devices.snapshot())
            }
            RegistryKind::Entities => {
                let items: Vec<Entity> = decode_list(kind.command(), result)?;
                self.entities
                    .replace_all(items.into_iter().map(|e| (e.entity_id.clone(), e)).collect());
                HubSignal::Entities(self.entities.snapshot())
            }
            RegistryKind::Areas => {
                let items: Vec<Area> = decode_list(kind.command(), result)?;
                self.areas
                    .replace_all(items.into_iter().map(|a| (a.area_id.clone(), a)).collect());
                HubSignal::Areas(self.areas.snapshot())
            }
            RegistryKind::Labels => {
                let items: Vec<Label> = decode_list(kind.command(), result)?;
                self.labels
                    .replace_all(items.into_iter().map(|l| (l.label_id.clone(), l)).collect());
                HubSignal::Labels(self.labels.snapshot())
            }
        };
        self.mark_refreshed();
        Ok(signal)
    }

    /// Replace all states with a `get_states` result.
    ///
    /// States for entities the registry does not know are skipped.
    pub(crate) fn apply_states(&self, result: Value) -> Result<HubSignal, CoreError> {
        let items: Vec<State> = decode_list("get_states", result)?;
        let total = items.len();
        let known: Vec<(String, State)> = items
            .into_iter()
            .filter(|s| self.entities.contains(&s.entity_id))
            .map(|s| (s.entity_id.clone(), s))
            .collect();

        let skipped = total - known.len();
        if skipped > 0 {
            debug!(skipped, "skipped states without a registry entity");
        }

        self.states.replace_all(known);
        self.mark_refreshed();
        Ok(HubSignal::States(self.states.snapshot()))
    }

    pub(crate) fn apply_config(&self, result: Value) -> Result<HubSignal, CoreError> {
        let config: HubConfig = decode("get_config", result)?;
        let config = Arc::new(config);
        self.config.send_replace(Some(Arc::clone(&config)));
        self.mark_refreshed();
        Ok(HubSignal::Config(config))
    }

    pub(crate) fn apply_services(&self, result: Value) -> Result<HubSignal, CoreError> {
        let services: Services = decode("get_services", result)?;
        let services = Arc::new(services);
        self.services.send_replace(Some(Arc::clone(&services)));
        self.mark_refreshed();
        Ok(HubSignal::Services(services))
    }

    /// Apply one `state_changed` event.
    pub(crate) fn apply_state_change(&self, change: &StateChange) -> StateApplied {
        if !self.entities.contains(&change.entity_id) {
            return StateApplied::UnknownEntity;
        }
        match &change.new_state {
            Some(state) => {
                self.states.upsert(change.entity_id.clone(), state.clone());
                StateApplied::Updated
            }
            None => {
                self.states.remove(&change.entity_id);
                StateApplied::Removed
            }
        }
    }
}

fn decode<T: DeserializeOwned>(command: &str, value: Value) -> Result<T, CoreError> {
    serde_json::from_value(value).map_err(|e| CoreError::Decode {
        message: format!("{command}: {e}"),
    })
}

/// Decode a list result item by item; malformed items are skipped.
fn decode_list<T: DeserializeOwned>(command: &str, value: Value) -> Result<Vec<T>, CoreError> {
    let Value::Array(items) = value else {
        return Err(CoreError::Decode {
            message: format!("{command}: expected a list"),
        });
    };

    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value(item) {
            Ok(v) => decoded.push(v),
            Err(e) => warn!(command, error = %e, "skipping malformed registry item"),
        }
    }
    Ok(decoded)
}

// ── Tests ────────────────────────────────────────────────────────────
