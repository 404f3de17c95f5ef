// ── Registry domain types ──
//
// Mirrors of the hub's device, entity, area and label registries. Only the
// fields the client reasons about are typed; everything else the hub sends
// is kept in `extra` so nothing is lost on a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString};

use crate::ids::reserved;

/// One of the four hub registries mirrored by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RegistryKind {
    Devices,
    Entities,
    Areas,
    Labels,
}

impl RegistryKind {
    /// The list command that returns the full registry.
    pub fn command(self) -> &'static str {
        match self {
            Self::Devices => "config/device_registry/list",
            Self::Entities => "config/entity_registry/list",
            Self::Areas => "config/area_registry/list",
            Self::Labels => "config/label_registry/list",
        }
    }

    /// Reserved correlation id used for bootstrap and re-fetches.
    pub fn reserved_id(self) -> u64 {
        match self {
            Self::Devices => reserved::DEVICE_REGISTRY,
            Self::Entities => reserved::ENTITY_REGISTRY,
            Self::Areas => reserved::AREA_REGISTRY,
            Self::Labels => reserved::LABEL_REGISTRY,
        }
    }

    /// Event type the hub fires when this registry changes.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "device_registry_updated" => Some(Self::Devices),
            "entity_registry_updated" => Some(Self::Entities),
            "area_registry_updated" => Some(Self::Areas),
            "label_registry_updated" => Some(Self::Labels),
            _ => None,
        }
    }
}

/// Entry of the device registry, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_by_user: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub disabled_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Name shown to people: the user override wins.
    pub fn display_name(&self) -> &str {
        self.name_by_user
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Entry of the entity registry, keyed by `entity_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    /// Registry-internal id.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub disabled_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    /// Domain part of the entity id (`light` for `light.kitchen`).
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }
}

/// Entry of the area registry, keyed by `area_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub area_id: String,
    pub name: String,
    #[serde(default)]
    pub floor_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of the label registry, keyed by `label_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub label_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
