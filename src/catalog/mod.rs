//! Catalog Provider abstraction
//!
//! Everything the validator and the cost estimator know about the cloud comes
//! through [`CatalogProvider`]: machine types, accelerators, storage locations,
//! quotas and billing SKUs. Implementations:
//!
//! - [`crate::gcp::GcpCatalog`] - live GCP REST APIs
//! - [`CatalogSnapshot`] - in-memory catalog, loadable from JSON
//! - [`CachedCatalog`] - memoizing wrapper around any provider

pub mod cache;
pub mod sku;
pub mod snapshot;

pub use cache::CachedCatalog;
pub use sku::{find_sku, monthly_cost, Money, PricingExpression, PricingInfo, Sku, TierRate};
pub use snapshot::CatalogSnapshot;

use crate::blueprint::StorageFamily;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Billing catalog service id of Compute Engine
pub const COMPUTE_ENGINE_SERVICE_ID: &str = "6F81-5844-456A";

/// Billing catalog service id of Filestore
pub const FILESTORE_SERVICE_ID: &str = "9662-B51E-5089";

/// vCPU and memory of a machine type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTypeDetails {
    pub guest_cpus: u64,
    pub memory_mb: u64,
}

impl MachineTypeDetails {
    pub fn memory_gib(&self) -> f64 {
        self.memory_mb as f64 / 1024.0
    }
}

/// One supported accelerator attachment for a machine type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    pub accelerator_type: String,
    pub accelerator_count: u64,
}

/// machine type -> supported accelerator attachments
pub type AcceleratorPairings = HashMap<String, Vec<AcceleratorConfig>>;

/// Read-only view over a cloud provider's resource and billing catalog.
///
/// Every call may fail. Callers in this crate never propagate those failures;
/// see [`or_no_data`].
#[allow(async_fn_in_trait)]
pub trait CatalogProvider {
    /// Machine type names offered in a zone
    async fn list_machine_types(&self, zone: &str) -> Result<HashSet<String>>;

    /// GPU accelerator type names offered in a zone
    async fn list_gpu_types(&self, zone: &str) -> Result<HashSet<String>>;

    /// TPU accelerator type names offered in a zone
    async fn list_tpu_types(&self, zone: &str) -> Result<HashSet<String>>;

    /// vCPU/memory of a machine type, `None` if the zone does not know it
    async fn get_machine_type_details(
        &self,
        zone: &str,
        machine_type: &str,
    ) -> Result<Option<MachineTypeDetails>>;

    /// Accelerator attachments supported per machine type in a zone
    async fn get_accelerator_pairings(&self, zone: &str) -> Result<AcceleratorPairings>;

    /// Regions where a managed filesystem family can be provisioned
    async fn list_storage_region_availability(
        &self,
        family: StorageFamily,
    ) -> Result<HashSet<String>>;

    /// Whether `required` units of quota `bucket` are available in `region`
    async fn check_quota(&self, region: &str, bucket: &str, required: u64) -> Result<bool>;

    /// Billing SKUs of a catalog service, in catalog order, optionally
    /// narrowed to descriptions containing `filter`
    async fn list_skus(&self, service_id: &str, filter: Option<&str>) -> Result<Vec<Sku>>;

    /// All zones visible to the project
    async fn list_zones(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Downgrade a provider failure to "no data", logging what was lost
pub fn or_no_data<T: Default>(result: Result<T>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Could not fetch {}: {:#}", what, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_no_data_keeps_values() {
        let value: Vec<u32> = or_no_data(Ok(vec![1, 2]), "numbers");
        assert_eq!(value, vec![1, 2]);
    }

    #[test]
    fn test_or_no_data_defaults_on_error() {
        let value: HashSet<String> = or_no_data(Err(anyhow::anyhow!("boom")), "zones");
        assert!(value.is_empty());

        let flag: bool = or_no_data(Err(anyhow::anyhow!("boom")), "quota");
        assert!(!flag);
    }

    #[test]
    fn test_memory_gib() {
        let details = MachineTypeDetails {
            guest_cpus: 4,
            memory_mb: 16384,
        };
        assert_eq!(details.memory_gib(), 16.0);
    }
}
