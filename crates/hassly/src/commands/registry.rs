//! `hassly registry <kind>`: one of the four mirrored registries.

use std::sync::Arc;

use tabled::Tabled;

use hassly_core::{Area, Device, Entity, HubClient, Label};

use crate::cli::{GlobalOpts, RegistryArgs, RegistryKindArg};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Manufacturer")]
    manufacturer: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Area")]
    area: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            id: d.id.clone(),
            name: d.display_name().to_owned(),
            manufacturer: d.manufacturer.clone().unwrap_or_default(),
            model: d.model.clone().unwrap_or_default(),
            area: d.area_id.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "Entity")]
    entity_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Disabled")]
    disabled: String,
}

impl From<&Arc<Entity>> for EntityRow {
    fn from(e: &Arc<Entity>) -> Self {
        Self {
            entity_id: e.entity_id.clone(),
            name: e.name.clone().unwrap_or_default(),
            platform: e.platform.clone().unwrap_or_default(),
            device: e.device_id.clone().unwrap_or_default(),
            disabled: e.disabled_by.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct AreaRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Floor")]
    floor: String,
}

impl From<&Arc<Area>> for AreaRow {
    fn from(a: &Arc<Area>) -> Self {
        Self {
            id: a.area_id.clone(),
            name: a.name.clone(),
            floor: a.floor_id.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct LabelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Color")]
    color: String,
}

impl From<&Arc<Label>> for LabelRow {
    fn from(l: &Arc<Label>) -> Self {
        Self {
            id: l.label_id.clone(),
            name: l.name.clone(),
            color: l.color.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &HubClient, args: &RegistryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::connect_ready(client).await?;
    let store = client.store();

    let out = match args.kind {
        RegistryKindArg::Devices => output::render_list(
            &global.output,
            &store.devices_snapshot(),
            |d| DeviceRow::from(d),
            |d| d.id.clone(),
        ),
        RegistryKindArg::Entities => output::render_list(
            &global.output,
            &store.entities_snapshot(),
            |e| EntityRow::from(e),
            |e| e.entity_id.clone(),
        ),
        RegistryKindArg::Areas => output::render_list(
            &global.output,
            &store.areas_snapshot(),
            |a| AreaRow::from(a),
            |a| a.area_id.clone(),
        ),
        RegistryKindArg::Labels => output::render_list(
            &global.output,
            &store.labels_snapshot(),
            |l| LabelRow::from(l),
            |l| l.label_id.clone(),
        ),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
