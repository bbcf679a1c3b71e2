//! In-memory catalog
//!
//! A [`CatalogSnapshot`] answers every provider query from data held in
//! memory. It can be loaded from a JSON file to validate or price blueprints
//! offline, and is what the test suites build their catalogs with.
//!
//! ```json
//! {
//!   "zones": {
//!     "us-central1-a": {
//!       "machine_types": {
//!         "n2-standard-4": { "guest_cpus": 4, "memory_mb": 16384 },
//!         "a2-highgpu-1g": {
//!           "guest_cpus": 12, "memory_mb": 87040,
//!           "accelerators": [{ "accelerator_type": "nvidia-tesla-a100", "accelerator_count": 1 }]
//!         }
//!       },
//!       "gpu_types": ["nvidia-tesla-a100"],
//!       "tpu_types": []
//!     }
//!   },
//!   "storage_regions": { "filestore": ["us-central1"] },
//!   "quotas": { "us-central1": { "CPUS": 2400 } },
//!   "skus": { "6F81-5844-456A": [ ... Cloud Billing SKU objects ... ] }
//! }
//! ```

use super::{AcceleratorConfig, AcceleratorPairings, CatalogProvider, MachineTypeDetails, Sku};
use crate::blueprint::StorageFamily;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// A machine type as recorded in a snapshot. Sizes may be omitted when only
/// availability matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTypeEntry {
    #[serde(default)]
    pub guest_cpus: Option<u64>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub accelerators: Vec<AcceleratorConfig>,
}

/// Everything known about one zone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneCatalog {
    #[serde(default)]
    pub machine_types: BTreeMap<String, MachineTypeEntry>,
    #[serde(default)]
    pub gpu_types: Vec<String>,
    #[serde(default)]
    pub tpu_types: Vec<String>,
}

/// In-memory [`CatalogProvider`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneCatalog>,
    #[serde(default)]
    pub storage_regions: BTreeMap<StorageFamily, Vec<String>>,
    /// region -> quota bucket -> available units. Buckets not listed are
    /// not enforced.
    #[serde(default)]
    pub quotas: BTreeMap<String, BTreeMap<String, u64>>,
    /// billing service id -> SKUs in catalog order
    #[serde(default)]
    pub skus: BTreeMap<String, Vec<Sku>>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse catalog snapshot JSON")
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot {}", path.display()))?;
        let snapshot = Self::from_json(&content)?;
        tracing::info!(
            "Loaded catalog snapshot {:?} ({} zones)",
            path,
            snapshot.zones.len()
        );
        Ok(snapshot)
    }

    fn zone_mut(&mut self, zone: &str) -> &mut ZoneCatalog {
        self.zones.entry(zone.to_string()).or_default()
    }

    /// Register an (empty) zone
    pub fn with_zone(mut self, zone: &str) -> Self {
        self.zone_mut(zone);
        self
    }

    pub fn with_machine_type(mut self, zone: &str, name: &str, guest_cpus: u64, memory_mb: u64) -> Self {
        let entry = self
            .zone_mut(zone)
            .machine_types
            .entry(name.to_string())
            .or_default();
        entry.guest_cpus = Some(guest_cpus);
        entry.memory_mb = Some(memory_mb);
        self
    }

    /// A machine type that is offered but whose sizes are unknown
    pub fn with_bare_machine_type(mut self, zone: &str, name: &str) -> Self {
        self.zone_mut(zone)
            .machine_types
            .entry(name.to_string())
            .or_default();
        self
    }

    pub fn with_pairing(mut self, zone: &str, machine_type: &str, accelerator_type: &str, count: u64) -> Self {
        self.zone_mut(zone)
            .machine_types
            .entry(machine_type.to_string())
            .or_default()
            .accelerators
            .push(AcceleratorConfig {
                accelerator_type: accelerator_type.to_string(),
                accelerator_count: count,
            });
        self
    }

    pub fn with_gpu_type(mut self, zone: &str, gpu_type: &str) -> Self {
        self.zone_mut(zone).gpu_types.push(gpu_type.to_string());
        self
    }

    pub fn with_tpu_type(mut self, zone: &str, tpu_type: &str) -> Self {
        self.zone_mut(zone).tpu_types.push(tpu_type.to_string());
        self
    }

    pub fn with_storage_region(mut self, family: StorageFamily, region: &str) -> Self {
        self.storage_regions
            .entry(family)
            .or_default()
            .push(region.to_string());
        self
    }

    pub fn with_quota(mut self, region: &str, bucket: &str, available: u64) -> Self {
        self.quotas
            .entry(region.to_string())
            .or_default()
            .insert(bucket.to_string(), available);
        self
    }

    pub fn with_sku(mut self, service_id: &str, sku: Sku) -> Self {
        self.skus.entry(service_id.to_string()).or_default().push(sku);
        self
    }
}

impl CatalogProvider for CatalogSnapshot {
    async fn list_machine_types(&self, zone: &str) -> Result<HashSet<String>> {
        Ok(self
            .zones
            .get(zone)
            .map(|z| z.machine_types.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_gpu_types(&self, zone: &str) -> Result<HashSet<String>> {
        Ok(self
            .zones
            .get(zone)
            .map(|z| z.gpu_types.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_tpu_types(&self, zone: &str) -> Result<HashSet<String>> {
        Ok(self
            .zones
            .get(zone)
            .map(|z| z.tpu_types.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_machine_type_details(
        &self,
        zone: &str,
        machine_type: &str,
    ) -> Result<Option<MachineTypeDetails>> {
        let entry = self
            .zones
            .get(zone)
            .and_then(|z| z.machine_types.get(machine_type));

        Ok(entry.and_then(|e| match (e.guest_cpus, e.memory_mb) {
            (Some(guest_cpus), Some(memory_mb)) => Some(MachineTypeDetails {
                guest_cpus,
                memory_mb,
            }),
            _ => None,
        }))
    }

    async fn get_accelerator_pairings(&self, zone: &str) -> Result<AcceleratorPairings> {
        let Some(zone) = self.zones.get(zone) else {
            return Ok(AcceleratorPairings::new());
        };

        Ok(zone
            .machine_types
            .iter()
            .filter(|(_, entry)| !entry.accelerators.is_empty())
            .map(|(name, entry)| (name.clone(), entry.accelerators.clone()))
            .collect())
    }

    async fn list_storage_region_availability(
        &self,
        family: StorageFamily,
    ) -> Result<HashSet<String>> {
        Ok(self
            .storage_regions
            .get(&family)
            .map(|regions| regions.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn check_quota(&self, region: &str, bucket: &str, required: u64) -> Result<bool> {
        let available = self.quotas.get(region).and_then(|q| q.get(bucket));
        Ok(available.map_or(true, |available| required <= *available))
    }

    async fn list_skus(&self, service_id: &str, filter: Option<&str>) -> Result<Vec<Sku>> {
        Ok(self
            .skus
            .get(service_id)
            .map(|skus| {
                skus.iter()
                    .filter(|sku| sku.matches_filter(filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        Ok(self.zones.keys().cloned().collect())
    }
}
