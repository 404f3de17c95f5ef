// ── Event router ──
//
// Applies hub events to the registry cache and fans them out as signals.
// Registry-changed notifications carry no usable payload, so the router
// only reports which registry needs a re-fetch; the client issues it.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use hassly_api::HubEvent;

use crate::model::{RegistryKind, StateChange};
use crate::signal::{HubSignal, SignalBus};
use crate::store::{RegistryStore, StateApplied};

/// What the router did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// The cache was updated.
    Applied,
    /// Emitted as a signal, cache untouched.
    Emitted,
    /// Dropped without touching the cache.
    Ignored,
    /// The given registry must be fetched again.
    Refresh(RegistryKind),
}

pub(crate) fn route_event(event: HubEvent, store: &RegistryStore, signals: &SignalBus) -> Route {
    store.mark_event();

    match event.event_type.as_str() {
        "state_changed" => route_state_change(event, store, signals),
        "call_service" => {
            signals.emit(HubSignal::CallService(Arc::new(event)));
            Route::Emitted
        }
        other => {
            if let Some(kind) = RegistryKind::from_event_type(other) {
                debug!(registry = %kind, "registry changed, scheduling re-fetch");
                return Route::Refresh(kind);
            }
            trace!(event_type = other, "passing through unhandled event type");
            signals.emit(HubSignal::Event(Arc::new(event)));
            Route::Emitted
        }
    }
}

fn route_state_change(event: HubEvent, store: &RegistryStore, signals: &SignalBus) -> Route {
    let change: StateChange = match serde_json::from_value(event.data.clone()) {
        Ok(change) => change,
        Err(e) => {
            warn!(error = %e, "malformed state_changed payload");
            return Route::Ignored;
        }
    };

    match store.apply_state_change(&change) {
        StateApplied::UnknownEntity => {
            debug!(entity_id = %change.entity_id, "state change for unknown entity, ignoring");
            Route::Ignored
        }
        StateApplied::Updated | StateApplied::Removed => {
            signals.emit(HubSignal::Event(Arc::new(event)));
            signals.emit(HubSignal::StateChanged(Arc::new(change)));
            Route::Applied
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
