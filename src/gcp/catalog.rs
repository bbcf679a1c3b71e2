//! GCP catalog provider
//!
//! [`CatalogProvider`] over the Compute Engine, Cloud TPU, Filestore,
//! Managed Lustre, Parallelstore and Cloud Billing REST APIs.

use super::client::GcpClient;
use super::http::ApiError;
use crate::blueprint::StorageFamily;
use crate::catalog::{
    AcceleratorConfig, AcceleratorPairings, CatalogProvider, MachineTypeDetails, Sku,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachineTypeResource {
    name: String,
    #[serde(default)]
    guest_cpus: u64,
    #[serde(default)]
    memory_mb: u64,
    #[serde(default)]
    accelerators: Vec<GuestAccelerator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestAccelerator {
    guest_accelerator_type: String,
    #[serde(default)]
    guest_accelerator_count: u64,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TpuAcceleratorType {
    #[serde(rename = "type")]
    accelerator_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    location_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegionResource {
    #[serde(default)]
    quotas: Vec<Quota>,
}

#[derive(Debug, Deserialize)]
struct Quota {
    metric: String,
    #[serde(default)]
    limit: f64,
    #[serde(default)]
    usage: f64,
}

fn parse_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| format!("Failed to parse {}", what))
}

/// Live catalog backed by GCP REST APIs
#[derive(Clone)]
pub struct GcpCatalog {
    client: GcpClient,
}

impl GcpCatalog {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }

    pub fn project_id(&self) -> &str {
        &self.client.project_id
    }

    async fn machine_types(&self, zone: &str) -> Result<Vec<MachineTypeResource>> {
        let url = self.client.compute_zonal_url(zone, "machineTypes");
        let items = self
            .client
            .get_all(&url, "items")
            .await
            .with_context(|| format!("Failed to list machine types in {}", zone))?;
        parse_items(items, "machine types")
    }
}

impl CatalogProvider for GcpCatalog {
    async fn list_machine_types(&self, zone: &str) -> Result<HashSet<String>> {
        Ok(self
            .machine_types(zone)
            .await?
            .into_iter()
            .map(|mt| mt.name)
            .collect())
    }

    async fn list_gpu_types(&self, zone: &str) -> Result<HashSet<String>> {
        let url = self.client.compute_zonal_url(zone, "acceleratorTypes");
        let items = self
            .client
            .get_all(&url, "items")
            .await
            .with_context(|| format!("Failed to list accelerator types in {}", zone))?;
        let types: Vec<NamedResource> = parse_items(items, "accelerator types")?;
        Ok(types.into_iter().map(|t| t.name).collect())
    }

    async fn list_tpu_types(&self, zone: &str) -> Result<HashSet<String>> {
        let url = self.client.tpu_accelerator_types_url(zone);
        let items = self
            .client
            .get_all(&url, "acceleratorTypes")
            .await
            .with_context(|| format!("Failed to list TPU types in {}", zone))?;
        let types: Vec<TpuAcceleratorType> = parse_items(items, "TPU types")?;
        Ok(types.into_iter().map(|t| t.accelerator_type).collect())
    }

    async fn get_machine_type_details(
        &self,
        zone: &str,
        machine_type: &str,
    ) -> Result<Option<MachineTypeDetails>> {
        let url = self
            .client
            .compute_zonal_url(zone, &format!("machineTypes/{}", machine_type));

        let response = match self.client.get(&url).await {
            Ok(response) => response,
            Err(e) if ApiError::is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to get machine type {}", machine_type))
            }
        };

        let resource: MachineTypeResource =
            serde_json::from_value(response).context("Failed to parse machine type")?;

        Ok(Some(MachineTypeDetails {
            guest_cpus: resource.guest_cpus,
            memory_mb: resource.memory_mb,
        }))
    }

    async fn get_accelerator_pairings(&self, zone: &str) -> Result<AcceleratorPairings> {
        Ok(self
            .machine_types(zone)
            .await?
            .into_iter()
            .filter(|mt| !mt.accelerators.is_empty())
            .map(|mt| {
                let configs = mt
                    .accelerators
                    .into_iter()
                    .map(|a| AcceleratorConfig {
                        accelerator_type: a.guest_accelerator_type,
                        accelerator_count: a.guest_accelerator_count,
                    })
                    .collect();
                (mt.name, configs)
            })
            .collect())
    }

    async fn list_storage_region_availability(
        &self,
        family: StorageFamily,
    ) -> Result<HashSet<String>> {
        let url = self.client.storage_locations_url(family);
        let items = self
            .client
            .get_all(&url, "locations")
            .await
            .with_context(|| format!("Failed to list {} locations", family.product_name()))?;
        let locations: Vec<Location> = parse_items(items, "locations")?;
        Ok(locations.into_iter().map(|l| l.location_id).collect())
    }

    async fn check_quota(&self, region: &str, bucket: &str, required: u64) -> Result<bool> {
        let url = self.client.compute_region_url(region);
        let response = self
            .client
            .get(&url)
            .await
            .with_context(|| format!("Failed to get region {}", region))?;
        let region_resource: RegionResource =
            serde_json::from_value(response).context("Failed to parse region quotas")?;

        let Some(quota) = region_resource.quotas.iter().find(|q| q.metric == bucket) else {
            tracing::debug!("Quota {} not reported for {}, not enforced", bucket, region);
            return Ok(true);
        };

        let available = quota.limit - quota.usage;
        tracing::debug!(
            "Quota {} in {}: {} available, {} required",
            bucket,
            region,
            available,
            required
        );
        Ok(available >= required as f64)
    }

    async fn list_skus(&self, service_id: &str, filter: Option<&str>) -> Result<Vec<Sku>> {
        let url = self.client.billing_skus_url(service_id);
        let items = self
            .client
            .get_all(&url, "skus")
            .await
            .with_context(|| format!("Failed to list SKUs for service {}", service_id))?;
        let skus: Vec<Sku> = parse_items(items, "SKUs")?;
        Ok(skus
            .into_iter()
            .filter(|sku| sku.matches_filter(filter))
            .collect())
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        let url = self.client.compute_url("zones");
        let items = self
            .client
            .get_all(&url, "items")
            .await
            .context("Failed to list zones")?;
        let zones: Vec<NamedResource> = parse_items(items, "zones")?;
        let mut names: Vec<String> = zones.into_iter().map(|z| z.name).collect();
        names.sort();
        Ok(names)
    }
}
