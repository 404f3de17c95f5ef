//! `hassly states`: entity states from the cache, after bootstrap.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tabled::Tabled;

use hassly_core::{HubClient, RegistryStore, State};

use crate::cli::{GlobalOpts, StatesArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Entity")]
    entity_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Changed")]
    changed: String,
}

impl From<&Arc<State>> for StateRow {
    fn from(s: &Arc<State>) -> Self {
        let changed = s
            .last_changed
            .and_then(|at| (Utc::now() - at).to_std().ok())
            .map(|age| format!("{} ago", util::since(age)))
            .unwrap_or_default();
        Self {
            entity_id: s.entity_id.clone(),
            name: s.friendly_name().to_owned(),
            state: s.state.to_string(),
            changed,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &HubClient, args: &StatesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::connect_ready(client).await?;

    let store = client.store();
    let on_device = args.device.as_deref().map(|d| device_entities(store, d));
    let mut states: Vec<Arc<State>> = store
        .states_snapshot()
        .iter()
        .filter(|s| keep(store, s, args, on_device.as_ref()))
        .cloned()
        .collect();
    states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

    let out = output::render_list(&global.output, &states, |s| StateRow::from(s), |s| s.entity_id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

fn keep(
    store: &RegistryStore,
    state: &State,
    args: &StatesArgs,
    on_device: Option<&HashSet<String>>,
) -> bool {
    if let Some(domain) = &args.domain {
        if state.entity_id.split_once('.').map(|(d, _)| d) != Some(domain.as_str()) {
            return false;
        }
    }
    if on_device.is_some_and(|ids| !ids.contains(&state.entity_id)) {
        return false;
    }

    if let Some(area) = &args.area {
        let Some(entity) = store.entity(&state.entity_id) else {
            return false;
        };
        // An entity inherits its device's area unless it overrides it.
        let area_id = entity.area_id.clone().or_else(|| {
            entity
                .device_id
                .as_deref()
                .and_then(|id| store.device(id))
                .and_then(|d| d.area_id.clone())
        });
        let Some(area_id) = area_id else {
            return false;
        };
        let named = store.area(&area_id).is_some_and(|a| a.name.eq_ignore_ascii_case(area));
        if area_id != *area && !named {
            return false;
        }
    }
    true
}

/// Entity ids on the device named or identified by `needle`. Several
/// devices may share a name; all of them count.
fn device_entities(store: &RegistryStore, needle: &str) -> HashSet<String> {
    store
        .devices_snapshot()
        .iter()
        .filter(|d| d.id == needle || d.display_name().eq_ignore_ascii_case(needle))
        .flat_map(|d| store.entities_for_device(&d.id))
        .map(|e| e.entity_id.clone())
        .collect()
}
