//! Blueprint generation
//!
//! Builds a cluster blueprint (network + Slurm nodeset + optional managed
//! filesystems) and renders it as YAML.

use super::model::StorageFamily;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

const NETWORK_SOURCE: &str = "modules/network/vpc";
const NODESET_SOURCE: &str = "community/modules/compute/schedmd-slurm-gcp-v6-nodeset";

/// Requested filesystem for a generated blueprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub storage_type: StorageFamily,
    pub capacity_gb: u64,
    pub id: Option<String>,
    pub mount: Option<String>,
    pub source: Option<String>,
}

impl StorageConfig {
    pub fn new(storage_type: StorageFamily, capacity_gb: u64) -> Self {
        Self {
            storage_type,
            capacity_gb,
            id: None,
            mount: None,
            source: None,
        }
    }

    fn default_source(&self) -> &'static str {
        match self.storage_type {
            StorageFamily::Filestore => "modules/file-system/filestore",
            StorageFamily::Lustre => "community/modules/file-system/DDN-EXAScaler",
            StorageFamily::Parallelstore => "modules/file-system/parallelstore",
        }
    }
}

#[derive(Debug, Serialize)]
struct Document {
    blueprint_name: String,
    vars: Vars,
    deployment_groups: Vec<DeploymentGroup>,
}

#[derive(Debug, Serialize)]
struct Vars {
    project_id: String,
    deployment_name: String,
    region: String,
    zone: String,
}

#[derive(Debug, Serialize)]
struct DeploymentGroup {
    group: String,
    modules: Vec<Module>,
}

#[derive(Debug, Serialize)]
struct Module {
    id: String,
    source: String,
    #[serde(rename = "use", skip_serializing_if = "Vec::is_empty")]
    uses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<Settings>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Settings {
    Compute(ComputeSettings),
    Storage(StorageSettings),
}

#[derive(Debug, Serialize)]
struct ComputeSettings {
    machine_type: String,
    node_count_dynamic_max: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    gpu: Option<AcceleratorSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tpu: Option<AcceleratorSettings>,
}

#[derive(Debug, Serialize)]
struct AcceleratorSettings {
    #[serde(rename = "type")]
    accelerator_type: String,
    count: u64,
}

#[derive(Debug, Serialize)]
struct StorageSettings {
    local_mount: String,
    capacity_gb: u64,
}

/// Builder for new blueprints
#[derive(Debug, Clone)]
pub struct BlueprintBuilder {
    blueprint_name: String,
    deployment_name: String,
    project_id: String,
    region: String,
    zone: String,
    machine_type: String,
    node_count: u64,
    gpu: Option<(String, u64)>,
    tpu: Option<(String, u64)>,
    storage: Vec<StorageConfig>,
}

impl BlueprintBuilder {
    pub fn new(blueprint_name: &str, deployment_name: &str, project_id: &str) -> Self {
        Self {
            blueprint_name: blueprint_name.to_string(),
            deployment_name: deployment_name.to_string(),
            project_id: project_id.to_string(),
            region: "us-central1".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "n2-standard-2".to_string(),
            node_count: 2,
            gpu: None,
            tpu: None,
            storage: Vec::new(),
        }
    }

    pub fn location(mut self, region: &str, zone: &str) -> Self {
        self.region = region.to_string();
        self.zone = zone.to_string();
        self
    }

    pub fn compute(mut self, machine_type: &str, node_count: u64) -> Self {
        self.machine_type = machine_type.to_string();
        self.node_count = node_count.max(1);
        self
    }

    pub fn gpu(mut self, gpu_type: &str, count: u64) -> Self {
        self.gpu = Some((gpu_type.to_string(), count));
        self
    }

    pub fn tpu(mut self, tpu_type: &str, count: u64) -> Self {
        self.tpu = Some((tpu_type.to_string(), count));
        self
    }

    pub fn storage(mut self, config: StorageConfig) -> Self {
        self.storage.push(config);
        self
    }

    fn build(&self) -> Document {
        let mut modules = vec![Module {
            id: "network".to_string(),
            source: NETWORK_SOURCE.to_string(),
            uses: Vec::new(),
            settings: None,
        }];

        modules.push(Module {
            id: "compute_nodeset".to_string(),
            source: NODESET_SOURCE.to_string(),
            uses: vec!["network".to_string()],
            settings: Some(Settings::Compute(ComputeSettings {
                machine_type: self.machine_type.clone(),
                node_count_dynamic_max: self.node_count,
                gpu: accelerator_settings(&self.gpu),
                tpu: accelerator_settings(&self.tpu),
            })),
        });

        for config in &self.storage {
            if config.capacity_gb == 0 {
                tracing::debug!("Skipping {} storage with zero capacity", config.storage_type);
                continue;
            }

            let id = config
                .id
                .clone()
                .unwrap_or_else(|| format!("{}fs", config.storage_type));
            let local_mount = config.mount.clone().unwrap_or_else(|| format!("/{}", id));
            let source = config
                .source
                .clone()
                .unwrap_or_else(|| config.default_source().to_string());

            modules.push(Module {
                id,
                source,
                uses: vec!["network".to_string()],
                settings: Some(Settings::Storage(StorageSettings {
                    local_mount,
                    capacity_gb: config.capacity_gb,
                })),
            });
        }

        Document {
            blueprint_name: self.blueprint_name.clone(),
            vars: Vars {
                project_id: self.project_id.clone(),
                deployment_name: self.deployment_name.clone(),
                region: self.region.clone(),
                zone: self.zone.clone(),
            },
            deployment_groups: vec![DeploymentGroup {
                group: "primary".to_string(),
                modules,
            }],
        }
    }

    /// Render the blueprint as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.build()).context("Failed to serialize blueprint")
    }

    /// Render and write the blueprint to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = self.to_yaml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write blueprint to {}", path.display()))?;
        tracing::info!("Wrote blueprint to {:?}", path);
        Ok(())
    }
}

fn accelerator_settings(requested: &Option<(String, u64)>) -> Option<AcceleratorSettings> {
    match requested {
        Some((accelerator_type, count)) if !accelerator_type.is_empty() && *count > 0 => {
            Some(AcceleratorSettings {
                accelerator_type: accelerator_type.clone(),
                count: *count,
            })
        }
        _ => None,
    }
}
