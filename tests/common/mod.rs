//! Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use hpcbp::blueprint::StorageFamily;
use hpcbp::catalog::sku::Sku;
use hpcbp::catalog::{
    AcceleratorPairings, CatalogProvider, CatalogSnapshot, MachineTypeDetails,
    COMPUTE_ENGINE_SERVICE_ID, FILESTORE_SERVICE_ID,
};
use std::collections::HashSet;

pub const REGION: &str = "us-central1";
pub const ZONE: &str = "us-central1-a";

/// A provider whose every call fails
pub struct FailingCatalog;

impl CatalogProvider for FailingCatalog {
    async fn list_machine_types(&self, _zone: &str) -> Result<HashSet<String>> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn list_gpu_types(&self, _zone: &str) -> Result<HashSet<String>> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn list_tpu_types(&self, _zone: &str) -> Result<HashSet<String>> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn get_machine_type_details(
        &self,
        _zone: &str,
        _machine_type: &str,
    ) -> Result<Option<MachineTypeDetails>> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn get_accelerator_pairings(&self, _zone: &str) -> Result<AcceleratorPairings> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn list_storage_region_availability(
        &self,
        _family: StorageFamily,
    ) -> Result<HashSet<String>> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn check_quota(&self, _region: &str, _bucket: &str, _required: u64) -> Result<bool> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn list_skus(&self, _service_id: &str, _filter: Option<&str>) -> Result<Vec<Sku>> {
        Err(anyhow!("catalog unavailable"))
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        Err(anyhow!("catalog unavailable"))
    }
}

/// A small us-central1-a catalog with N2, N1+T4 and A2 machines
pub fn hpc_catalog() -> CatalogSnapshot {
    CatalogSnapshot::new()
        .with_machine_type(ZONE, "n2-standard-4", 4, 16384)
        .with_machine_type(ZONE, "n1-standard-8", 8, 30720)
        .with_pairing(ZONE, "n1-standard-8", "nvidia-tesla-t4", 1)
        .with_pairing(ZONE, "n1-standard-8", "nvidia-tesla-t4", 4)
        .with_machine_type(ZONE, "a2-highgpu-8g", 96, 696320)
        .with_pairing(ZONE, "a2-highgpu-8g", "nvidia-tesla-a100", 8)
        .with_gpu_type(ZONE, "nvidia-tesla-t4")
        .with_gpu_type(ZONE, "nvidia-tesla-a100")
        .with_storage_region(StorageFamily::Filestore, REGION)
        .with_storage_region(StorageFamily::Lustre, REGION)
        .with_quota(REGION, "CPUS", 2400)
        .with_quota(REGION, "GPUS_NVIDIA_A100", 16)
        .with_sku(
            COMPUTE_ENGINE_SERVICE_ID,
            Sku::new("N2 vCPU running in Americas", &[REGION], "hour", 0.02),
        )
        .with_sku(
            COMPUTE_ENGINE_SERVICE_ID,
            Sku::new("N2 RAM running in Americas", &[REGION], "gibibyte hour", 0.003),
        )
        .with_sku(
            COMPUTE_ENGINE_SERVICE_ID,
            Sku::new("Nvidia Tesla T4 GPU running in Americas", &[REGION], "hour", 0.35),
        )
        .with_sku(
            FILESTORE_SERVICE_ID,
            Sku::new("Filestore Zonal Capacity (Basic HDD) in Iowa", &[REGION], "gibibyte month", 0.2),
        )
}

/// One Slurm nodeset module
pub fn nodeset_blueprint(machine_type: &str, node_count: u64, gpu: Option<(&str, u64)>) -> String {
    let gpu = gpu
        .map(|(gpu_type, count)| format!("\n          gpu:\n            type: {gpu_type}\n            count: {count}"))
        .unwrap_or_default();

    format!(
        r#"blueprint_name: test-cluster
vars:
  project_id: test-project
  deployment_name: test
  region: us-central1
  zone: us-central1-a
deployment_groups:
  - group: primary
    modules:
      - id: network
        source: modules/network/vpc
      - id: compute_nodeset
        source: community/modules/compute/schedmd-slurm-gcp-v6-nodeset
        use: [network]
        settings:
          machine_type: {machine_type}
          node_count_static: {node_count}{gpu}
"#
    )
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
