// ── Domain model ──
//
// Canonical client-side representation of what the hub reports. Registry
// entries are keyed by the hub's natural identifiers and never deduplicated
// by display name.

pub mod hub;
pub mod registry;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use hub::{HubConfig, ServiceCall, ServiceResponse, Services};
pub use registry::{Area, Device, Entity, Label, RegistryKind};
pub use state::{State, StateChange, StateValue};
