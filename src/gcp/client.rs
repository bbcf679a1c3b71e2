//! GCP Client
//!
//! Combines credentials and the HTTP client, builds per-service URLs and
//! walks paginated list responses.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use crate::blueprint::StorageFamily;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Base URLs of the APIs the catalog reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub compute: String,
    pub tpu: String,
    pub filestore: String,
    pub lustre: String,
    pub parallelstore: String,
    pub billing: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            tpu: "https://tpu.googleapis.com/v2".to_string(),
            filestore: "https://file.googleapis.com/v1".to_string(),
            lustre: "https://lustre.googleapis.com/v1".to_string(),
            parallelstore: "https://parallelstore.googleapis.com/v1".to_string(),
            billing: "https://cloudbilling.googleapis.com/v1".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Every API under one host, as `{root}/{service}/{version}`
    pub fn single_host(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            compute: format!("{}/compute/v1", root),
            tpu: format!("{}/tpu/v2", root),
            filestore: format!("{}/file/v1", root),
            lustre: format!("{}/lustre/v1", root),
            parallelstore: format!("{}/parallelstore/v1", root),
            billing: format!("{}/billing/v1", root),
        }
    }

    fn storage(&self, family: StorageFamily) -> &str {
        match family {
            StorageFamily::Filestore => &self.filestore,
            StorageFamily::Lustre => &self.lustre,
            StorageFamily::Parallelstore => &self.parallelstore,
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub endpoints: ApiEndpoints,
}

impl GcpClient {
    /// Client for `project_id` using default credentials and endpoints
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(project_id, credentials, ApiEndpoints::default())
    }

    pub fn with_credentials(
        project_id: &str,
        credentials: GcpCredentials,
        endpoints: ApiEndpoints,
    ) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            endpoints,
        })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.get(url, &token).await
    }

    /// GET every page of a list call and concatenate the `items_key` arrays
    pub async fn get_all(&self, url: &str, items_key: &str) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let page_url = with_page_token(url, page_token.as_deref())?;
            let response = self.get(&page_url).await?;

            if let Some(items) = response.get(items_key).and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());
            }

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string());

            match &page_token {
                None => break,
                Some(token) if !seen_tokens.insert(token.clone()) => {
                    tracing::warn!("Stopping pagination of {}: page token repeated", url);
                    break;
                }
                Some(_) => {}
            }
        }

        tracing::debug!("Fetched {} {} from {}", all_items.len(), items_key, url);
        Ok(all_items)
    }

    // =========================================================================
    // Compute Engine
    // =========================================================================

    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    pub fn compute_zonal_url(&self, zone: &str, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", zone, resource))
    }

    pub fn compute_region_url(&self, region: &str) -> String {
        self.compute_url(&format!("regions/{}", region))
    }

    // =========================================================================
    // Cloud TPU
    // =========================================================================

    pub fn tpu_accelerator_types_url(&self, zone: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/acceleratorTypes",
            self.endpoints.tpu, self.project_id, zone
        )
    }

    // =========================================================================
    // Managed filesystems
    // =========================================================================

    pub fn storage_locations_url(&self, family: StorageFamily) -> String {
        format!(
            "{}/projects/{}/locations",
            self.endpoints.storage(family),
            self.project_id
        )
    }

    // =========================================================================
    // Cloud Billing catalog
    // =========================================================================

    pub fn billing_skus_url(&self, service_id: &str) -> String {
        format!("{}/services/{}/skus", self.endpoints.billing, service_id)
    }
}

fn with_page_token(url: &str, page_token: Option<&str>) -> Result<String> {
    let Some(token) = page_token else {
        return Ok(url.to_string());
    };

    let mut parsed = Url::parse(url).with_context(|| format!("Invalid API URL: {}", url))?;
    parsed.query_pairs_mut().append_pair("pageToken", token);
    Ok(parsed.to_string())
}
