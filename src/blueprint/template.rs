//! Generation templates
//!
//! A template is a flat YAML file of default values for `generate`
//! (machine type, node count, accelerators, storage, ...). Values given on
//! the command line take precedence over the template.

use super::model::StorageFamily;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const TEMPLATE_EXTENSION: &str = "yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateTemplate {
    pub blueprint_name: Option<String>,
    pub deployment_name: Option<String>,
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub machine_type: Option<String>,
    pub node_count: Option<u64>,
    pub gpu_type: Option<String>,
    pub gpu_count: Option<u64>,
    pub tpu_type: Option<String>,
    pub tpu_count: Option<u64>,
    pub storage_type: Option<String>,
    pub storage_capacity_gb: Option<u64>,
}

impl GenerateTemplate {
    /// Parse template text; an empty file is an empty template
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse template")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid template {}", path.display()))
    }

    /// Storage family named by `storage_type`, if it names a known one
    pub fn storage_family(&self) -> Option<StorageFamily> {
        self.storage_type.as_deref().and_then(StorageFamily::parse)
    }
}

/// `<config_dir>/hpcbp/templates`
pub fn templates_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hpcbp").join("templates"))
}

/// Resolve a template argument: an existing file path, or the name of a
/// `<name>.yaml` file in `dir`
pub fn resolve_template(name_or_path: &str, dir: Option<&Path>) -> Option<PathBuf> {
    let path = PathBuf::from(name_or_path);
    if path.is_file() {
        return Some(path);
    }

    let named = dir?.join(format!("{}.{}", name_or_path, TEMPLATE_EXTENSION));
    named.is_file().then_some(named)
}

/// Names of the templates in `dir`, sorted; empty when the directory is missing
pub fn list_templates(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION)
        })
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    names
}
