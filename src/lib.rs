//! HPC blueprint validation and cost estimation for Google Cloud
//!
//! # Module Structure
//!
//! - [`blueprint`] - blueprint parsing, resource extraction and generation
//! - [`catalog`] - the [`catalog::CatalogProvider`] boundary, SKU pricing
//!   helpers, in-memory and memoizing providers
//! - [`gcp`] - the live GCP REST provider
//! - [`validate`] - availability, pairing and quota checks
//! - [`cost`] - monthly cost estimation
//! - [`region`] - zone/region helpers and the zone finder
//! - [`report`] - plain-text rendering of results
//! - [`config`] - persistent user defaults

pub mod blueprint;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod gcp;
pub mod region;
pub mod report;
pub mod validate;

pub use blueprint::{parse_blueprint, Blueprint, BlueprintError, ExtractedResources};
pub use catalog::{CachedCatalog, CatalogProvider, CatalogSnapshot};
pub use cost::{CostEstimator, CostResult};
pub use validate::{ValidationResult, Validator};
