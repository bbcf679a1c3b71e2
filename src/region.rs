//! Zones and regions
//!
//! Region/zone naming helpers and the zone finder, which lists the zones
//! where a set of machine types, GPU types and storage families are all
//! offered.

use crate::blueprint::{ExtractedResources, StorageFamily};
use crate::catalog::{or_no_data, CatalogProvider};
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};

/// Zones tried when the provider cannot list them
pub const KNOWN_ZONES: &[&str] = &[
    // US
    "us-central1-a",
    "us-central1-b",
    "us-central1-c",
    "us-central1-f",
    "us-east1-b",
    "us-east1-c",
    "us-east1-d",
    "us-east4-a",
    "us-east4-b",
    "us-east4-c",
    "us-east5-a",
    "us-east5-b",
    "us-east5-c",
    "us-south1-a",
    "us-south1-b",
    "us-south1-c",
    "us-west1-a",
    "us-west1-b",
    "us-west1-c",
    "us-west2-a",
    "us-west2-b",
    "us-west2-c",
    "us-west3-a",
    "us-west3-b",
    "us-west3-c",
    "us-west4-a",
    "us-west4-b",
    "us-west4-c",
    // Europe
    "europe-west1-b",
    "europe-west1-c",
    "europe-west1-d",
    "europe-west2-a",
    "europe-west2-b",
    "europe-west2-c",
    "europe-west3-a",
    "europe-west3-b",
    "europe-west3-c",
    "europe-west4-a",
    "europe-west4-b",
    "europe-west4-c",
    "europe-north1-a",
    "europe-north1-b",
    "europe-north1-c",
    // Asia
    "asia-east1-a",
    "asia-east1-b",
    "asia-east1-c",
    "asia-northeast1-a",
    "asia-northeast1-b",
    "asia-northeast1-c",
    "asia-south1-a",
    "asia-south1-b",
    "asia-south1-c",
    "asia-southeast1-a",
    "asia-southeast1-b",
    "asia-southeast1-c",
    // Australia
    "australia-southeast1-a",
    "australia-southeast1-b",
    "australia-southeast1-c",
    // South America
    "southamerica-east1-a",
    "southamerica-east1-b",
    "southamerica-east1-c",
];

/// Region of a zone ("us-central1-a" -> "us-central1")
pub fn region_of_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, _)) => region.to_string(),
        None => zone.to_string(),
    }
}

/// What a zone must offer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneRequirements {
    pub machine_types: BTreeSet<String>,
    pub gpu_types: BTreeSet<String>,
    pub storage: BTreeSet<StorageFamily>,
}

impl ZoneRequirements {
    /// Everything a blueprint's resources need (TPUs excluded)
    pub fn from_resources(resources: &ExtractedResources) -> Self {
        let mut requirements = Self::default();

        for instance in &resources.compute_instances {
            requirements
                .machine_types
                .insert(instance.machine_type.clone());
            for gpu in instance.gpus() {
                requirements.gpu_types.insert(gpu.accelerator_type.clone());
            }
        }

        for storage in &resources.storage_instances {
            requirements.storage.insert(storage.storage_type);
        }

        requirements
    }

    pub fn is_empty(&self) -> bool {
        self.machine_types.is_empty() && self.gpu_types.is_empty() && self.storage.is_empty()
    }
}

/// Zones to search: the provider's zone list (or [`KNOWN_ZONES`] when it
/// has none), restricted to `regions` when any are given
pub async fn candidate_zones<P: CatalogProvider>(catalog: &P, regions: &[String]) -> Vec<String> {
    let mut zones = or_no_data(catalog.list_zones().await, "zones");
    if zones.is_empty() {
        tracing::debug!("Provider listed no zones, using built-in list");
        zones = KNOWN_ZONES.iter().map(|z| z.to_string()).collect();
    }

    if !regions.is_empty() {
        zones.retain(|zone| regions.contains(&region_of_zone(zone)));
    }

    zones
}

/// The `candidates` that satisfy every requirement, in candidate order
pub async fn find_zones<P: CatalogProvider>(
    catalog: &P,
    requirements: &ZoneRequirements,
    candidates: &[String],
) -> Vec<String> {
    let mut storage_regions: Vec<HashSet<String>> = Vec::new();
    for family in &requirements.storage {
        storage_regions.push(or_no_data(
            catalog.list_storage_region_availability(*family).await,
            &format!("{} locations", family.product_name()),
        ));
    }
    let storage_regions = &storage_regions;

    let checks = candidates.iter().map(|zone| async move {
        let fits = zone_fits(catalog, requirements, storage_regions, zone).await;
        (zone, fits)
    });

    let zones: Vec<String> = join_all(checks)
        .await
        .into_iter()
        .filter(|(_, fits)| *fits)
        .map(|(zone, _)| zone.clone())
        .collect();

    tracing::info!(
        "{} of {} candidate zones satisfy the requirements",
        zones.len(),
        candidates.len()
    );
    zones
}

async fn zone_fits<P: CatalogProvider>(
    catalog: &P,
    requirements: &ZoneRequirements,
    storage_regions: &[HashSet<String>],
    zone: &str,
) -> bool {
    let region = region_of_zone(zone);
    if !storage_regions.iter().all(|regions| regions.contains(&region)) {
        return false;
    }

    if !requirements.machine_types.is_empty() {
        let offered = or_no_data(catalog.list_machine_types(zone).await, "machine types");
        if !requirements.machine_types.iter().all(|mt| offered.contains(mt)) {
            return false;
        }
    }

    if !requirements.gpu_types.is_empty() {
        let offered = or_no_data(catalog.list_gpu_types(zone).await, "GPU types");
        if !requirements.gpu_types.iter().all(|gpu| offered.contains(gpu)) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{parse_blueprint, extract};
    use crate::catalog::CatalogSnapshot;

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_machine_type("us-central1-a", "a2-highgpu-1g", 12, 87040)
            .with_gpu_type("us-central1-a", "nvidia-tesla-a100")
            .with_machine_type("us-central1-b", "a2-highgpu-1g", 12, 87040)
            .with_machine_type("europe-west4-a", "a2-highgpu-1g", 12, 87040)
            .with_gpu_type("europe-west4-a", "nvidia-tesla-a100")
            .with_storage_region(StorageFamily::Filestore, "us-central1")
    }

    fn zones(names: &[&str]) -> Vec<String> {
        names.iter().map(|z| z.to_string()).collect()
    }

    #[test]
    fn test_region_of_zone() {
        assert_eq!(region_of_zone("us-central1-a"), "us-central1");
        assert_eq!(region_of_zone("europe-west4-b"), "europe-west4");
        assert_eq!(region_of_zone("local"), "local");
    }

    #[test]
    fn test_known_zones_are_well_formed() {
        assert!(KNOWN_ZONES.contains(&"us-central1-a"));
        assert!(KNOWN_ZONES.iter().all(|z| region_of_zone(z) != *z));
    }

    #[tokio::test]
    async fn test_find_zones_requires_everything() {
        let catalog = catalog();
        let candidates = zones(&["us-central1-a", "us-central1-b", "europe-west4-a"]);

        let mut requirements = ZoneRequirements::default();
        requirements.machine_types.insert("a2-highgpu-1g".to_string());
        assert_eq!(find_zones(&catalog, &requirements, &candidates).await, candidates);

        requirements.gpu_types.insert("nvidia-tesla-a100".to_string());
        assert_eq!(
            find_zones(&catalog, &requirements, &candidates).await,
            zones(&["us-central1-a", "europe-west4-a"])
        );

        requirements.storage.insert(StorageFamily::Filestore);
        assert_eq!(
            find_zones(&catalog, &requirements, &candidates).await,
            zones(&["us-central1-a"])
        );
    }

    #[tokio::test]
    async fn test_requirements_from_blueprint() {
        let blueprint = parse_blueprint(
            r#"
deployment_groups:
  - group: primary
    modules:
      - id: nodeset
        settings:
          machine_type: a2-highgpu-1g
          gpu: {type: nvidia-tesla-a100, count: 1}
      - id: homefs
        source: modules/file-system/filestore
        settings: {capacity_gb: 1024}
"#,
        )
        .unwrap();
        let requirements = ZoneRequirements::from_resources(&extract(&blueprint));

        assert!(requirements.machine_types.contains("a2-highgpu-1g"));
        assert!(requirements.gpu_types.contains("nvidia-tesla-a100"));
        assert!(requirements.storage.contains(&StorageFamily::Filestore));

        let found = find_zones(&catalog(), &requirements, &zones(&["us-central1-a", "europe-west4-a"])).await;
        assert_eq!(found, zones(&["us-central1-a"]));
    }

    #[tokio::test]
    async fn test_candidate_zones() {
        let catalog = catalog();
        assert_eq!(
            candidate_zones(&catalog, &["us-central1".to_string()]).await,
            zones(&["us-central1-a", "us-central1-b"])
        );

        let fallback = candidate_zones(&CatalogSnapshot::new(), &["europe-west4".to_string()]).await;
        assert_eq!(fallback, zones(&["europe-west4-a", "europe-west4-b", "europe-west4-c"]));
    }
}
