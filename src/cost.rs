//! Cost Estimator
//!
//! Maps an [`ExtractedResources`] onto the billing catalog and produces a
//! monthly estimate. Missing pricing data never fails the estimate: the gap
//! is recorded in the breakdown as a status string and contributes nothing
//! to the total.

use crate::blueprint::{
    self, parse_blueprint, Accelerator, Blueprint, BlueprintError, ComputeInstance,
    ExtractedResources, StorageFamily, StorageInstance,
};
use crate::catalog::{
    find_sku, monthly_cost, or_no_data, CatalogProvider, Sku, COMPUTE_ENGINE_SERVICE_ID,
    FILESTORE_SERVICE_ID,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

pub const SKU_NOT_FOUND: &str = "SKU Not Found";
pub const MACHINE_DETAILS_NOT_FOUND: &str = "Machine Type Details Not Found";
pub const PRICING_NOT_IMPLEMENTED: &str = "Pricing model not yet implemented";

/// One breakdown value: a monthly amount, or why there is none
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostEntry {
    Amount(f64),
    Status(String),
}

impl CostEntry {
    pub fn amount(&self) -> f64 {
        match self {
            CostEntry::Amount(amount) => *amount,
            CostEntry::Status(_) => 0.0,
        }
    }
}

/// Line items in insertion order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostBreakdown {
    items: Vec<(String, CostEntry)>,
}

impl CostBreakdown {
    /// Record a line item. A repeated label accumulates amounts; a status
    /// never replaces an amount already counted.
    pub fn record(&mut self, label: String, entry: CostEntry) {
        let Some(index) = self.items.iter().position(|(l, _)| *l == label) else {
            self.items.push((label, entry));
            return;
        };

        match (&mut self.items[index].1, entry) {
            (CostEntry::Amount(total), CostEntry::Amount(amount)) => *total += amount,
            (CostEntry::Amount(_), CostEntry::Status(_)) => {}
            (existing, entry) => *existing = entry,
        }
    }

    pub fn get(&self, label: &str) -> Option<&CostEntry> {
        self.items.iter().find(|(l, _)| l == label).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CostEntry)> {
        self.items.iter().map(|(l, e)| (l.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of the numeric entries
    pub fn total(&self) -> f64 {
        self.items.iter().map(|(_, e)| e.amount()).sum()
    }
}

impl Serialize for CostBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (label, entry) in &self.items {
            map.serialize_entry(label, entry)?;
        }
        map.end()
    }
}

/// Estimated monthly cost of a blueprint
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CostResult {
    pub total: f64,
    pub breakdown: CostBreakdown,
}

impl From<CostBreakdown> for CostResult {
    fn from(breakdown: CostBreakdown) -> Self {
        Self {
            total: breakdown.total(),
            breakdown,
        }
    }
}

/// Accelerator name as it appears in GPU SKU descriptions
/// ("nvidia-tesla-t4" -> "t4")
pub fn normalize_accelerator_name(accelerator_type: &str) -> String {
    accelerator_type
        .replace("nvidia-", "")
        .replace("tesla-", "")
        .trim()
        .to_string()
}

/// Machine series used in component SKU descriptions ("n2-standard-4" -> "N2")
pub fn machine_series(machine_type: &str) -> String {
    machine_type
        .split('-')
        .next()
        .unwrap_or(machine_type)
        .to_uppercase()
}

/// Prices blueprint resources against a billing catalog
pub struct CostEstimator<'a, P> {
    catalog: &'a P,
}

impl<'a, P: CatalogProvider> CostEstimator<'a, P> {
    pub fn new(catalog: &'a P) -> Self {
        Self { catalog }
    }

    pub async fn estimate_yaml(
        &self,
        content: &str,
        region: &str,
        zone: &str,
    ) -> Result<CostResult, BlueprintError> {
        let blueprint = parse_blueprint(content)?;
        Ok(self.estimate_blueprint(&blueprint, region, zone).await)
    }

    pub async fn estimate_blueprint(
        &self,
        blueprint: &Blueprint,
        region: &str,
        zone: &str,
    ) -> CostResult {
        let resources = blueprint::extract(blueprint);
        self.estimate(&resources, region, zone).await
    }

    /// Monthly estimate with an itemized breakdown
    pub async fn estimate(
        &self,
        resources: &ExtractedResources,
        region: &str,
        zone: &str,
    ) -> CostResult {
        let mut breakdown = CostBreakdown::default();

        if !resources.compute_instances.is_empty() {
            let skus = self.skus(COMPUTE_ENGINE_SERVICE_ID).await;
            for instance in &resources.compute_instances {
                self.price_instance(instance, &skus, region, zone, &mut breakdown)
                    .await;
            }
        }

        if !resources.storage_instances.is_empty() {
            let needs_filestore = resources
                .storage_instances
                .iter()
                .any(|s| s.storage_type == StorageFamily::Filestore);
            let filestore_skus = if needs_filestore {
                self.skus(FILESTORE_SERVICE_ID).await
            } else {
                Vec::new()
            };

            for storage in &resources.storage_instances {
                price_storage(storage, &filestore_skus, region, &mut breakdown);
            }
        }

        let result = CostResult::from(breakdown);
        tracing::info!(
            "Estimated ${:.2}/month over {} line items",
            result.total,
            result.breakdown.len()
        );
        result
    }

    async fn skus(&self, service_id: &str) -> Vec<Sku> {
        let skus = or_no_data(
            self.catalog.list_skus(service_id, None).await,
            &format!("SKUs for service {}", service_id),
        );
        tracing::debug!("Loaded {} SKUs for service {}", skus.len(), service_id);
        skus
    }

    async fn price_instance(
        &self,
        instance: &ComputeInstance,
        skus: &[Sku],
        region: &str,
        zone: &str,
        breakdown: &mut CostBreakdown,
    ) {
        let machine_type = instance.machine_type.as_str();
        let node_count = instance.node_count;

        // All-inclusive instance SKUs (A2, C3, H3, ...) price the whole VM
        if let Some(sku) = find_sku(skus, &[machine_type, "instance"], region) {
            let cost = monthly_cost(sku, node_count as f64);
            if cost > 0.0 {
                breakdown.record(
                    format!("{}x {} Instance", node_count, machine_type),
                    CostEntry::Amount(cost),
                );
                return;
            }
        }

        let details = or_no_data(
            self.catalog.get_machine_type_details(zone, machine_type).await,
            &format!("details for machine type '{}'", machine_type),
        );
        let Some(details) = details else {
            breakdown.record(
                format!("{}x {}", node_count, machine_type),
                CostEntry::Status(MACHINE_DETAILS_NOT_FOUND.to_string()),
            );
            return;
        };

        let series = machine_series(machine_type);

        record_component(
            breakdown,
            format!("{}x {} (vCPU)", node_count, machine_type),
            find_sku(skus, &[series.as_str(), "vCPU"], region),
            details.guest_cpus.saturating_mul(node_count) as f64,
        );

        record_component(
            breakdown,
            format!("{}x {} (Memory)", node_count, machine_type),
            find_sku(skus, &[series.as_str(), "RAM"], region),
            details.memory_gib() * node_count as f64,
        );

        for accelerator in &instance.accelerators {
            price_accelerator(accelerator, node_count, skus, region, breakdown);
        }
    }
}

fn price_accelerator(
    accelerator: &Accelerator,
    node_count: u64,
    skus: &[Sku],
    region: &str,
    breakdown: &mut CostBreakdown,
) {
    let total_count = accelerator.count.saturating_mul(node_count);
    let name = normalize_accelerator_name(&accelerator.accelerator_type);

    record_component(
        breakdown,
        format!("{}x {} GPU", total_count, accelerator.accelerator_type),
        find_sku(skus, &[name.as_str(), "GPU"], region),
        total_count as f64,
    );
}

fn record_component(
    breakdown: &mut CostBreakdown,
    label: String,
    sku: Option<&Sku>,
    usage_amount: f64,
) {
    let entry = match sku {
        Some(sku) => CostEntry::Amount(monthly_cost(sku, usage_amount)),
        None => {
            tracing::debug!("No SKU for {}", label);
            CostEntry::Status(SKU_NOT_FOUND.to_string())
        }
    };
    breakdown.record(label, entry);
}

fn price_storage(
    storage: &StorageInstance,
    filestore_skus: &[Sku],
    region: &str,
    breakdown: &mut CostBreakdown,
) {
    let label = format!("Storage ({})", storage.storage_type.display_name());

    match storage.storage_type {
        StorageFamily::Filestore => record_component(
            breakdown,
            label,
            find_sku(filestore_skus, &["Zonal", "Capacity"], region),
            storage.capacity_gb as f64,
        ),
        StorageFamily::Lustre | StorageFamily::Parallelstore => breakdown.record(
            label,
            CostEntry::Status(PRICING_NOT_IMPLEMENTED.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accelerator_name() {
        assert_eq!(normalize_accelerator_name("nvidia-tesla-t4"), "t4");
        assert_eq!(normalize_accelerator_name("nvidia-l4"), "l4");
        assert_eq!(normalize_accelerator_name(" nvidia-h100-80gb "), "h100-80gb");
    }

    #[test]
    fn test_machine_series() {
        assert_eq!(machine_series("n2-standard-4"), "N2");
        assert_eq!(machine_series("c3d-highmem-180"), "C3D");
        assert_eq!(machine_series("custom"), "CUSTOM");
    }

    #[test]
    fn test_breakdown_accumulates_repeated_labels() {
        let mut breakdown = CostBreakdown::default();
        breakdown.record("Storage (Filestore)".to_string(), CostEntry::Amount(10.0));
        breakdown.record("Storage (Filestore)".to_string(), CostEntry::Amount(5.5));
        breakdown.record("Storage (Lustre)".to_string(), CostEntry::Status(PRICING_NOT_IMPLEMENTED.to_string()));
        breakdown.record("Storage (Filestore)".to_string(), CostEntry::Status(SKU_NOT_FOUND.to_string()));

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown.get("Storage (Filestore)"), Some(&CostEntry::Amount(15.5)));
        assert_eq!(breakdown.total(), 15.5);
    }

    #[test]
    fn test_breakdown_serializes_as_ordered_map() {
        let mut breakdown = CostBreakdown::default();
        breakdown.record("2x n2-standard-4 (vCPU)".to_string(), CostEntry::Amount(116.8));
        breakdown.record("Storage (Lustre)".to_string(), CostEntry::Status(PRICING_NOT_IMPLEMENTED.to_string()));

        let json = serde_json::to_string(&CostResult::from(breakdown)).unwrap();
        assert_eq!(
            json,
            r#"{"total":116.8,"breakdown":{"2x n2-standard-4 (vCPU)":116.8,"Storage (Lustre)":"Pricing model not yet implemented"}}"#
        );
    }
}
