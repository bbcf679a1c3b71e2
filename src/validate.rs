//! Constraint Validator
//!
//! Checks an [`ExtractedResources`] against what the catalog reports for a
//! region/zone. All checks run on every call and every finding is collected,
//! so one pass shows the complete list of problems.
//!
//! Checks, in order:
//! 1. machine type availability in the zone
//! 2. GPU type availability in the zone (TPUs are not checked)
//! 3. storage family availability in the region
//! 4. GPU/machine pairing (type and count must match a supported pair exactly)
//! 5. regional quota for the aggregated CPU and per-family GPU demand

use crate::blueprint::{self, parse_blueprint, Blueprint, BlueprintError, ExtractedResources};
use crate::catalog::{or_no_data, CatalogProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quota bucket for regional vCPUs
pub const CPU_QUOTA_BUCKET: &str = "CPUS";

/// Normalized GPU type -> quota bucket
const GPU_QUOTA_BUCKETS: &[(&str, &str)] = &[
    ("nvidia-tesla-a100", "GPUS_NVIDIA_A100"),
    ("nvidia-tesla-p4", "GPUS_NVIDIA_TESLA_P4"),
    ("nvidia-tesla-v100", "GPUS_NVIDIA_TESLA_V100"),
    ("nvidia-tesla-k80", "GPUS_NVIDIA_K80"),
];

/// Quota bucket for a GPU type, if one is known
pub fn gpu_quota_bucket(gpu_type: &str) -> Option<&'static str> {
    let normalized = gpu_type.to_lowercase().replace(' ', "-");
    GPU_QUOTA_BUCKETS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, bucket)| *bucket)
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            passed: errors.is_empty(),
            errors,
        }
    }
}

/// Validates blueprint resources against a catalog
pub struct Validator<'a, P> {
    catalog: &'a P,
}

impl<'a, P: CatalogProvider> Validator<'a, P> {
    pub fn new(catalog: &'a P) -> Self {
        Self { catalog }
    }

    /// Parse descriptor text, extract and validate. Only unparseable input
    /// is an error; everything else is a finding.
    pub async fn validate_yaml(
        &self,
        content: &str,
        region: &str,
        zone: &str,
    ) -> Result<ValidationResult, BlueprintError> {
        let blueprint = parse_blueprint(content)?;
        Ok(self.validate_blueprint(&blueprint, region, zone).await)
    }

    pub async fn validate_blueprint(
        &self,
        blueprint: &Blueprint,
        region: &str,
        zone: &str,
    ) -> ValidationResult {
        let resources = blueprint::extract(blueprint);
        self.validate(&resources, region, zone).await
    }

    /// Parse descriptor text and run only the quota check
    pub async fn check_quota_yaml(
        &self,
        content: &str,
        region: &str,
        zone: &str,
    ) -> Result<ValidationResult, BlueprintError> {
        let blueprint = parse_blueprint(content)?;
        let resources = blueprint::extract(&blueprint);
        Ok(self.check_quota(&resources, region, zone).await)
    }

    /// Regional CPU and GPU quota against aggregated demand, without the
    /// availability and pairing checks
    pub async fn check_quota(
        &self,
        resources: &ExtractedResources,
        region: &str,
        zone: &str,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        self.check_quotas(resources, region, zone, &mut errors).await;
        ValidationResult::from_errors(errors)
    }

    /// Run every check and collect all findings
    pub async fn validate(
        &self,
        resources: &ExtractedResources,
        region: &str,
        zone: &str,
    ) -> ValidationResult {
        tracing::info!(
            "Validating {} compute / {} storage resources in {} ({})",
            resources.compute_instances.len(),
            resources.storage_instances.len(),
            zone,
            region
        );

        let mut errors = Vec::new();

        self.check_machine_types(resources, zone, &mut errors).await;
        self.check_gpu_types(resources, zone, &mut errors).await;
        self.check_storage_regions(resources, region, &mut errors).await;
        self.check_pairings(resources, zone, &mut errors).await;
        self.check_quotas(resources, region, zone, &mut errors).await;

        if !errors.is_empty() {
            tracing::info!("Validation found {} problem(s)", errors.len());
        }

        ValidationResult::from_errors(errors)
    }

    async fn check_machine_types(
        &self,
        resources: &ExtractedResources,
        zone: &str,
        errors: &mut Vec<String>,
    ) {
        if resources.compute_instances.is_empty() {
            return;
        }

        let available = or_no_data(
            self.catalog.list_machine_types(zone).await,
            "machine types",
        );

        for instance in &resources.compute_instances {
            if !available.contains(&instance.machine_type) {
                errors.push(format!(
                    "Machine type '{}' is not available in zone '{}'.",
                    instance.machine_type, zone
                ));
            }
        }
    }

    async fn check_gpu_types(
        &self,
        resources: &ExtractedResources,
        zone: &str,
        errors: &mut Vec<String>,
    ) {
        let mut gpus = resources.compute_instances.iter().flat_map(|i| i.gpus()).peekable();
        if gpus.peek().is_none() {
            return;
        }

        let available = or_no_data(self.catalog.list_gpu_types(zone).await, "GPU types");

        for gpu in gpus {
            if !available.contains(&gpu.accelerator_type) {
                errors.push(format!(
                    "GPU type '{}' is not available in zone '{}'.",
                    gpu.accelerator_type, zone
                ));
            }
        }
    }

    async fn check_storage_regions(
        &self,
        resources: &ExtractedResources,
        region: &str,
        errors: &mut Vec<String>,
    ) {
        for storage in &resources.storage_instances {
            let family = storage.storage_type;
            let regions = or_no_data(
                self.catalog.list_storage_region_availability(family).await,
                &format!("{} locations", family.product_name()),
            );

            if !regions.contains(region) {
                errors.push(format!(
                    "{} is not available in region '{}'.",
                    family.product_name(),
                    region
                ));
            }
        }
    }

    async fn check_pairings(
        &self,
        resources: &ExtractedResources,
        zone: &str,
        errors: &mut Vec<String>,
    ) {
        let with_gpus: Vec<_> = resources
            .compute_instances
            .iter()
            .filter(|i| i.gpus().next().is_some())
            .collect();
        if with_gpus.is_empty() {
            return;
        }

        let pairings = or_no_data(
            self.catalog.get_accelerator_pairings(zone).await,
            "accelerator pairings",
        );

        for instance in with_gpus {
            let supported = match pairings.get(&instance.machine_type) {
                Some(configs) if !configs.is_empty() => configs,
                _ => {
                    errors.push(format!(
                        "VM type '{}' does not support any accelerators in zone '{}'.",
                        instance.machine_type, zone
                    ));
                    continue;
                }
            };

            for gpu in instance.gpus() {
                let is_supported = supported.iter().any(|config| {
                    config.accelerator_type == gpu.accelerator_type
                        && config.accelerator_count == gpu.count
                });

                if !is_supported {
                    errors.push(format!(
                        "VM type '{}' does not support attaching {}x '{}' in zone '{}'.",
                        instance.machine_type, gpu.count, gpu.accelerator_type, zone
                    ));
                }
            }
        }
    }

    async fn check_quotas(
        &self,
        resources: &ExtractedResources,
        region: &str,
        zone: &str,
        errors: &mut Vec<String>,
    ) {
        let mut cpu_required: u64 = 0;
        // BTreeMap keeps the per-bucket queries in a stable order
        let mut gpu_required: BTreeMap<&'static str, u64> = BTreeMap::new();

        for instance in &resources.compute_instances {
            let details = or_no_data(
                self.catalog
                    .get_machine_type_details(zone, &instance.machine_type)
                    .await,
                &format!("details for machine type '{}'", instance.machine_type),
            );

            // Without details the whole instance is left out of quota demand
            let Some(details) = details else {
                errors.push(format!(
                    "Could not retrieve details for machine type '{}' for quota check.",
                    instance.machine_type
                ));
                continue;
            };

            // Saturate so oversized demand fails the quota check instead of wrapping
            cpu_required =
                cpu_required.saturating_add(details.guest_cpus.saturating_mul(instance.node_count));

            for gpu in instance.gpus() {
                match gpu_quota_bucket(&gpu.accelerator_type) {
                    Some(bucket) => {
                        let demand = gpu.count.saturating_mul(instance.node_count);
                        let entry = gpu_required.entry(bucket).or_default();
                        *entry = entry.saturating_add(demand);
                    }
                    None => errors.push(format!(
                        "Quota check skipped: Unknown quota name for GPU type '{}'.",
                        gpu.accelerator_type
                    )),
                }
            }
        }

        if cpu_required > 0 && !self.has_quota(region, CPU_QUOTA_BUCKET, cpu_required).await {
            errors.push(format!(
                "Insufficient CPU quota in region '{}'. Required: {}.",
                region, cpu_required
            ));
        }

        for (bucket, required) in gpu_required {
            if !self.has_quota(region, bucket, required).await {
                errors.push(format!(
                    "Insufficient quota for '{}' in region '{}'. Required: {}.",
                    bucket, region, required
                ));
            }
        }
    }

    async fn has_quota(&self, region: &str, bucket: &str, required: u64) -> bool {
        tracing::debug!("Checking quota {} in {}: {} required", bucket, region, required);
        or_no_data(
            self.catalog.check_quota(region, bucket, required).await,
            &format!("quota '{}'", bucket),
        )
    }
}
