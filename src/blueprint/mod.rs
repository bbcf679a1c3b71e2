//! Blueprint documents
//!
//! Parsing of HPC blueprint descriptors and the normalized resource model
//! derived from them.
//!
//! # Module Structure
//!
//! - [`model`] - `ExtractedResources` and its compute/storage/accelerator entries
//! - [`extract`] - Best-effort walk of `deployment_groups[].modules[]`
//! - [`builder`] - Generation of new blueprint documents
//! - [`template`] - Default values for generation, loaded from YAML
//!
//! # Example
//!
//! ```ignore
//! use hpcbp::blueprint::{extract, parse_blueprint};
//!
//! let blueprint = parse_blueprint(&std::fs::read_to_string("cluster.yaml")?)?;
//! let resources = extract(&blueprint);
//! println!("{} compute groups", resources.compute_instances.len());
//! ```

pub mod builder;
pub mod extract;
pub mod model;
pub mod template;

pub use builder::{BlueprintBuilder, StorageConfig};
pub use extract::extract;
pub use template::GenerateTemplate;
pub use model::{
    Accelerator, AcceleratorFamily, ComputeInstance, ExtractedResources, StorageFamily,
    StorageInstance,
};

use serde_yaml::Value;
use thiserror::Error;

/// Fatal errors raised before extraction is attempted
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// The descriptor text is not valid YAML
    #[error("Error parsing YAML content: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The descriptor parsed to nothing (empty file, `null`, ...)
    #[error("YAML content is empty or invalid.")]
    Empty,
}

/// A parsed blueprint document
#[derive(Debug, Clone)]
pub struct Blueprint {
    document: Value,
}

impl Blueprint {
    /// Wrap an already-parsed document
    pub fn from_value(document: Value) -> Self {
        Self { document }
    }

    /// The raw document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Top-level `vars` of the blueprint
    pub fn vars(&self) -> BlueprintVars<'_> {
        BlueprintVars {
            vars: self.document.get("vars"),
        }
    }
}

/// Read-only view over the `vars` mapping of a blueprint
#[derive(Debug, Clone, Copy)]
pub struct BlueprintVars<'a> {
    vars: Option<&'a Value>,
}

impl<'a> BlueprintVars<'a> {
    fn get_str(&self, key: &str) -> Option<&'a str> {
        self.vars?
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn project_id(&self) -> Option<&'a str> {
        self.get_str("project_id")
    }

    pub fn region(&self) -> Option<&'a str> {
        self.get_str("region")
    }

    pub fn zone(&self) -> Option<&'a str> {
        self.get_str("zone")
    }

    pub fn deployment_name(&self) -> Option<&'a str> {
        self.get_str("deployment_name")
    }

    pub fn blueprint_name(&self) -> Option<&'a str> {
        self.get_str("blueprint_name")
    }
}

/// Parse blueprint descriptor text
pub fn parse_blueprint(content: &str) -> Result<Blueprint, BlueprintError> {
    if content.trim().is_empty() {
        return Err(BlueprintError::Empty);
    }

    let document: Value = serde_yaml::from_str(content)?;

    if document.is_null() {
        return Err(BlueprintError::Empty);
    }

    Ok(Blueprint::from_value(document))
}
