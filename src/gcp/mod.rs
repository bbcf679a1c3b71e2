//! GCP API interaction module
//!
//! # Module Structure
//!
//! - [`auth`] - access tokens and gcloud defaults
//! - [`client`] - authenticated client, endpoint URLs and pagination
//! - [`http`] - HTTP utilities for REST API calls
//! - [`catalog`] - [`GcpCatalog`], the live [`crate::catalog::CatalogProvider`]
//!
//! # Example
//!
//! ```ignore
//! use hpcbp::gcp::{GcpCatalog, GcpClient};
//! use hpcbp::catalog::CatalogProvider;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let catalog = GcpCatalog::new(GcpClient::new("my-project").await?);
//!     let machine_types = catalog.list_machine_types("us-central1-a").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod catalog;
pub mod client;
pub mod http;

pub use catalog::GcpCatalog;
pub use client::{ApiEndpoints, GcpClient};
