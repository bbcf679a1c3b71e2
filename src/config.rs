//! Configuration Management
//!
//! Persistent defaults for hpcbp, stored as JSON under the user config
//! directory.

use crate::gcp::auth;
use crate::region::region_of_zone;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Zone used when nothing else names one
pub const FALLBACK_ZONE: &str = "us-central1-a";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

impl Config {
    /// `<config_dir>/hpcbp/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("hpcbp").join("config.json"))
    }

    /// Load configuration from disk, defaults when missing or unreadable
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Saved project, then gcloud defaults
    pub fn effective_project(&self) -> Option<String> {
        self.project_id.clone().or_else(auth::get_default_project)
    }

    /// Saved zone, then gcloud defaults, then [`FALLBACK_ZONE`]
    pub fn effective_zone(&self) -> String {
        self.zone
            .clone()
            .or_else(auth::get_default_zone)
            .unwrap_or_else(|| FALLBACK_ZONE.to_string())
    }

    /// Saved region, then the region of the saved zone, then gcloud
    /// defaults, then the region of [`Config::effective_zone`]
    pub fn effective_region(&self) -> String {
        self.region
            .clone()
            .or_else(|| self.zone.as_deref().map(region_of_zone))
            .or_else(auth::get_default_region)
            .unwrap_or_else(|| region_of_zone(&self.effective_zone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hpcbp").join("config.json");

        let config = Config {
            project_id: Some("hpc-research-42".to_string()),
            region: None,
            zone: Some("europe-west4-a".to_string()),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_missing_or_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(Config::load_from(&path), Config::default());

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_region_follows_saved_zone() {
        let config = Config {
            zone: Some("asia-east1-b".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_zone(), "asia-east1-b");
        assert_eq!(config.effective_region(), "asia-east1");

        let explicit = Config {
            region: Some("us-east4".to_string()),
            zone: Some("asia-east1-b".to_string()),
            ..Default::default()
        };
        assert_eq!(explicit.effective_region(), "us-east4");
    }
}
