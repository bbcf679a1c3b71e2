//! Resource Extractor
//!
//! Walks `deployment_groups[].modules[]` and builds [`ExtractedResources`].
//! Module settings are loosely typed, so every recognized field has its own
//! narrow accessor and anything else is ignored rather than rejected.

use super::model::{
    Accelerator, AcceleratorFamily, ComputeInstance, ExtractedResources, StorageFamily,
    StorageInstance,
};
use super::Blueprint;
use serde_yaml::Value;

/// Source/id markers per storage family, checked in this order.
/// DDN EXAScaler is the Lustre engine shipped with the HPC toolkit.
const STORAGE_MARKERS: &[(StorageFamily, &[&str])] = &[
    (StorageFamily::Lustre, &["lustre", "exascaler"]),
    (StorageFamily::Filestore, &["filestore"]),
    (StorageFamily::Parallelstore, &["parallelstore"]),
];

/// Extract the normalized resource model from a blueprint
pub fn extract(blueprint: &Blueprint) -> ExtractedResources {
    extract_document(blueprint.document())
}

/// Extract from a raw document. Never fails: a document without
/// `deployment_groups` simply yields no resources.
pub fn extract_document(document: &Value) -> ExtractedResources {
    let mut resources = ExtractedResources::default();

    for module in modules(document) {
        let Some(settings) = module.get("settings").filter(|s| s.is_mapping()) else {
            continue;
        };

        if let Some(instance) = compute_instance(settings) {
            tracing::debug!(
                "Extracted compute: {} x{} ({} accelerators)",
                instance.machine_type,
                instance.node_count,
                instance.accelerators.len()
            );
            resources.compute_instances.push(instance);
        }

        if let Some(storage) = storage_instance(module, settings) {
            tracing::debug!(
                "Extracted storage: {} {} GB",
                storage.storage_type,
                storage.capacity_gb
            );
            resources.storage_instances.push(storage);
        }
    }

    resources
}

fn modules(document: &Value) -> impl Iterator<Item = &Value> {
    document
        .get("deployment_groups")
        .and_then(|v| v.as_sequence())
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("modules").and_then(|v| v.as_sequence()))
        .flatten()
        .filter(|module| module.is_mapping())
}

// =============================================================================
// Compute
// =============================================================================

fn compute_instance(settings: &Value) -> Option<ComputeInstance> {
    let machine_type = machine_type(settings)?;

    let accelerators = [
        accelerator(settings, "gpu", AcceleratorFamily::Gpu),
        accelerator(settings, "tpu", AcceleratorFamily::Tpu),
    ]
    .into_iter()
    .flatten()
    .collect();

    Some(ComputeInstance {
        machine_type: machine_type.to_string(),
        node_count: node_count(settings),
        accelerators,
    })
}

fn machine_type(settings: &Value) -> Option<&str> {
    settings
        .get("machine_type")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Dynamic max wins over static; both absent means a single node
fn node_count(settings: &Value) -> u64 {
    ["node_count_dynamic_max", "node_count_static"]
        .iter()
        .find_map(|key| settings.get(*key).and_then(|v| v.as_u64()).filter(|n| *n > 0))
        .unwrap_or(1)
}

fn accelerator(settings: &Value, key: &str, family: AcceleratorFamily) -> Option<Accelerator> {
    let block = settings.get(key).filter(|v| v.is_mapping())?;

    let accelerator_type = block
        .get("type")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    // count 0 is not an attachment
    let count = block.get("count").and_then(|v| v.as_u64()).filter(|c| *c > 0)?;

    Some(Accelerator {
        accelerator_type: accelerator_type.to_string(),
        count,
        family,
    })
}

// =============================================================================
// Storage
// =============================================================================

fn storage_instance(module: &Value, settings: &Value) -> Option<StorageInstance> {
    let source = module.get("source").and_then(|v| v.as_str()).unwrap_or("");
    let id = module.get("id").and_then(|v| v.as_str()).unwrap_or("");

    let Some(capacity_gb) = capacity_gb(settings) else {
        if settings.get("local_mount").is_some() && storage_family(source, id).is_some() {
            tracing::debug!("Skipping storage module '{}' without capacity_gb", id);
        }
        return None;
    };

    let storage_type = storage_family(source, id)?;

    Some(StorageInstance {
        storage_type,
        capacity_gb,
    })
}

fn capacity_gb(settings: &Value) -> Option<u64> {
    settings
        .get("capacity_gb")
        .and_then(|v| v.as_u64())
        .filter(|c| *c > 0)
}

/// Infer the storage family from a module's source path or id
pub fn storage_family(source: &str, id: &str) -> Option<StorageFamily> {
    let source = source.to_lowercase();
    let id = id.to_lowercase();

    STORAGE_MARKERS
        .iter()
        .find(|(_, markers)| {
            markers
                .iter()
                .any(|m| source.contains(m) || id.contains(m))
        })
        .map(|(family, _)| *family)
}
