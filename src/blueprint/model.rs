//! Normalized resource model
//!
//! `ExtractedResources` is built fresh for every validation or cost run and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accelerator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcceleratorFamily {
    Gpu,
    Tpu,
}

/// An accelerator attached to every node of a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accelerator {
    #[serde(rename = "type")]
    pub accelerator_type: String,
    pub count: u64,
    pub family: AcceleratorFamily,
}

impl Accelerator {
    pub fn is_gpu(&self) -> bool {
        self.family == AcceleratorFamily::Gpu
    }
}

/// A group of identical compute nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub machine_type: String,
    pub node_count: u64,
    #[serde(default)]
    pub accelerators: Vec<Accelerator>,
}

impl ComputeInstance {
    /// GPU-family accelerators only
    pub fn gpus(&self) -> impl Iterator<Item = &Accelerator> {
        self.accelerators.iter().filter(|a| a.is_gpu())
    }
}

/// Managed filesystem families recognized in blueprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFamily {
    Filestore,
    Lustre,
    Parallelstore,
}

impl StorageFamily {
    pub const ALL: [StorageFamily; 3] = [
        StorageFamily::Filestore,
        StorageFamily::Lustre,
        StorageFamily::Parallelstore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageFamily::Filestore => "filestore",
            StorageFamily::Lustre => "lustre",
            StorageFamily::Parallelstore => "parallelstore",
        }
    }

    /// Product name used in user-facing messages
    pub fn product_name(self) -> &'static str {
        match self {
            StorageFamily::Filestore => "Filestore",
            StorageFamily::Lustre => "Managed Lustre",
            StorageFamily::Parallelstore => "Parallelstore",
        }
    }

    /// Capitalized family name ("Filestore", "Lustre", ...)
    pub fn display_name(self) -> &'static str {
        match self {
            StorageFamily::Filestore => "Filestore",
            StorageFamily::Lustre => "Lustre",
            StorageFamily::Parallelstore => "Parallelstore",
        }
    }

    /// Parse a family name as typed by a user
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "filestore" => Some(StorageFamily::Filestore),
            "lustre" => Some(StorageFamily::Lustre),
            "parallelstore" => Some(StorageFamily::Parallelstore),
            _ => None,
        }
    }
}

impl fmt::Display for StorageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed filesystem instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInstance {
    pub storage_type: StorageFamily,
    pub capacity_gb: u64,
}

/// Normalized view of a blueprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedResources {
    pub compute_instances: Vec<ComputeInstance>,
    pub storage_instances: Vec<StorageInstance>,
}

impl ExtractedResources {
    pub fn is_empty(&self) -> bool {
        self.compute_instances.is_empty() && self.storage_instances.is_empty()
    }
}
