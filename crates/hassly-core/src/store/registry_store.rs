// ── Registry cache ──
//
// Local mirror of the hub's registries, runtime state and the two
// whole-document snapshots (config, services). Owned by one client
// session and never cleared implicitly: a reconnect keeps every known
// identity available until fresh data replaces it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::RegistryCollection;
use crate::model::{Area, Device, Entity, HubConfig, Label, RegistryKind, Services, State};
use crate::stream::RegistryStream;

/// Reactive store for everything the client mirrors from the hub.
///
/// Reads are cheap `Arc` clones; mutations come from bootstrap fetches
/// and the event router only.
pub struct RegistryStore {
    pub(crate) devices: RegistryCollection<Device>,
    pub(crate) entities: RegistryCollection<Entity>,
    pub(crate) areas: RegistryCollection<Area>,
    pub(crate) labels: RegistryCollection<Label>,
    pub(crate) states: RegistryCollection<State>,
    pub(crate) config: watch::Sender<Option<Arc<HubConfig>>>,
    pub(crate) services: watch::Sender<Option<Arc<Services>>>,
    pub(crate) last_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_event: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore {
    pub fn new() -> Self {
        let (config, _) = watch::channel(None);
        let (services, _) = watch::channel(None);
        let (last_refresh, _) = watch::channel(None);
        let (last_event, _) = watch::channel(None);

        Self {
            devices: RegistryCollection::new(),
            entities: RegistryCollection::new(),
            areas: RegistryCollection::new(),
            labels: RegistryCollection::new(),
            states: RegistryCollection::new(),
            config,
            services,
            last_refresh,
            last_event,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn entities_snapshot(&self) -> Arc<Vec<Arc<Entity>>> {
        self.entities.snapshot()
    }

    pub fn areas_snapshot(&self) -> Arc<Vec<Arc<Area>>> {
        self.areas.snapshot()
    }

    pub fn labels_snapshot(&self) -> Arc<Vec<Arc<Label>>> {
        self.labels.snapshot()
    }

    pub fn states_snapshot(&self) -> Arc<Vec<Arc<State>>> {
        self.states.snapshot()
    }

    /// Latest `get_config` document, if one has been received.
    pub fn config(&self) -> Option<Arc<HubConfig>> {
        self.config.borrow().clone()
    }

    /// Latest `get_services` document, if one has been received.
    pub fn services(&self) -> Option<Arc<Services>> {
        self.services.borrow().clone()
    }

    // ── Single-entry lookups ─────────────────────────────────────────

    pub fn device(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    pub fn entity(&self, entity_id: &str) -> Option<Arc<Entity>> {
        self.entities.get(entity_id)
    }

    pub fn area(&self, area_id: &str) -> Option<Arc<Area>> {
        self.areas.get(area_id)
    }

    pub fn label(&self, label_id: &str) -> Option<Arc<Label>> {
        self.labels.get(label_id)
    }

    pub fn state(&self, entity_id: &str) -> Option<Arc<State>> {
        self.states.get(entity_id)
    }

    /// Entities attached to a device.
    pub fn entities_for_device(&self, device_id: &str) -> Vec<Arc<Entity>> {
        self.entities
            .snapshot()
            .iter()
            .filter(|e| e.device_id.as_deref() == Some(device_id))
            .cloned()
            .collect()
    }

    // ── Counts ───────────────────────────────────────────────────────

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn registry_len(&self, kind: RegistryKind) -> usize {
        match kind {
            RegistryKind::Devices => self.device_count(),
            RegistryKind::Entities => self.entity_count(),
            RegistryKind::Areas => self.area_count(),
            RegistryKind::Labels => self.label_count(),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> RegistryStream<Device> {
        RegistryStream::new(self.devices.subscribe())
    }

    pub fn subscribe_entities(&self) -> RegistryStream<Entity> {
        RegistryStream::new(self.entities.subscribe())
    }

    pub fn subscribe_areas(&self) -> RegistryStream<Area> {
        RegistryStream::new(self.areas.subscribe())
    }

    pub fn subscribe_labels(&self) -> RegistryStream<Label> {
        RegistryStream::new(self.labels.subscribe())
    }

    pub fn subscribe_states(&self) -> RegistryStream<State> {
        RegistryStream::new(self.states.subscribe())
    }

    pub fn subscribe_config(&self) -> watch::Receiver<Option<Arc<HubConfig>>> {
        self.config.subscribe()
    }

    pub fn subscribe_services(&self) -> watch::Receiver<Option<Arc<Services>>> {
        self.services.subscribe()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    /// When a bootstrap fetch last replaced part of the cache.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// When the last hub event was routed.
    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        *self.last_event.borrow()
    }

    pub(crate) fn mark_refreshed(&self) {
        self.last_refresh.send_replace(Some(Utc::now()));
    }

    pub(crate) fn mark_event(&self) {
        self.last_event.send_replace(Some(Utc::now()));
    }

    /// Empty every cache. The client never calls this on its own.
    pub fn clear(&self) {
        self.devices.clear();
        self.entities.clear();
        self.areas.clear();
        self.labels.clear();
        self.states.clear();
        self.config.send_replace(None);
        self.services.send_replace(None);
        self.last_refresh.send_replace(None);
        self.last_event.send_replace(None);
    }
}
