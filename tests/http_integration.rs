//! Integration tests for the GCP catalog provider using wiremock
//!
//! Every API is served from one mock host via `ApiEndpoints::single_host`,
//! so paths look like `/compute/v1/projects/test-project/...`.

use hpcbp::blueprint::StorageFamily;
use hpcbp::catalog::{CachedCatalog, CatalogProvider, COMPUTE_ENGINE_SERVICE_ID};
use hpcbp::gcp::auth::GcpCredentials;
use hpcbp::gcp::http::format_gcp_error;
use hpcbp::gcp::{ApiEndpoints, GcpCatalog, GcpClient};
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ZONE_PATH: &str = "/compute/v1/projects/test-project/zones/us-central1-a";

fn catalog(server: &MockServer) -> GcpCatalog {
    let client = GcpClient::with_credentials(
        "test-project",
        GcpCredentials::from_token("test-token"),
        ApiEndpoints::single_host(&server.uri()),
    )
    .expect("client should build");
    GcpCatalog::new(client)
}

fn machine_types_page() -> serde_json::Value {
    json!({
        "items": [
            {"name": "n2-standard-4", "guestCpus": 4, "memoryMb": 16384},
            {
                "name": "a2-highgpu-1g", "guestCpus": 12, "memoryMb": 87040,
                "accelerators": [{"guestAcceleratorType": "nvidia-tesla-a100", "guestAcceleratorCount": 1}]
            }
        ],
        "nextPageToken": "token-page-2"
    })
}

fn machine_types_last_page() -> serde_json::Value {
    json!({
        "items": [
            {
                "name": "g2-standard-4", "guestCpus": 4, "memoryMb": 16384,
                "accelerators": [{"guestAcceleratorType": "nvidia-l4", "guestAcceleratorCount": 1}]
            }
        ]
    })
}

async fn mount_machine_types(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{}/machineTypes", ZONE_PATH)))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_types_page()))
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/machineTypes", ZONE_PATH)))
        .and(query_param("pageToken", "token-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_types_last_page()))
        .mount(server)
        .await;
}

mod compute_tests {
    use super::*;

    /// Machine type listing follows nextPageToken
    #[tokio::test]
    async fn test_machine_types_across_pages() {
        let server = MockServer::start().await;
        mount_machine_types(&server).await;

        let machine_types = catalog(&server)
            .list_machine_types("us-central1-a")
            .await
            .expect("listing should succeed");

        assert_eq!(machine_types.len(), 3);
        assert!(machine_types.contains("n2-standard-4"));
        assert!(machine_types.contains("g2-standard-4"));
    }

    /// A server that keeps handing back the same page token does not loop forever
    #[tokio::test]
    async fn test_repeated_page_token_stops_listing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/machineTypes", ZONE_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "n2-standard-4"}],
                "nextPageToken": "stuck"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/machineTypes", ZONE_PATH)))
            .and(query_param("pageToken", "stuck"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "c2-standard-60"}],
                "nextPageToken": "stuck"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let machine_types = catalog(&server)
            .list_machine_types("us-central1-a")
            .await
            .expect("listing should succeed");

        assert_eq!(machine_types.len(), 2);
        assert!(machine_types.contains("c2-standard-60"));
    }

    /// Pairings come from the accelerators of each machine type
    #[tokio::test]
    async fn test_accelerator_pairings() {
        let server = MockServer::start().await;
        mount_machine_types(&server).await;

        let pairings = catalog(&server)
            .get_accelerator_pairings("us-central1-a")
            .await
            .expect("listing should succeed");

        assert_eq!(pairings.len(), 2);
        assert_eq!(pairings["a2-highgpu-1g"][0].accelerator_type, "nvidia-tesla-a100");
        assert_eq!(pairings["g2-standard-4"][0].accelerator_count, 1);
        assert!(!pairings.contains_key("n2-standard-4"));
    }

    #[tokio::test]
    async fn test_machine_type_details() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/machineTypes/n2-standard-4", ZONE_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "n2-standard-4", "guestCpus": 4, "memoryMb": 16384
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/machineTypes/n9-imaginary-1", ZONE_PATH)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The resource was not found"}
            })))
            .mount(&server)
            .await;

        let catalog = catalog(&server);

        let details = catalog
            .get_machine_type_details("us-central1-a", "n2-standard-4")
            .await
            .unwrap()
            .expect("details should be present");
        assert_eq!(details.guest_cpus, 4);
        assert_eq!(details.memory_mb, 16384);

        let missing = catalog
            .get_machine_type_details("us-central1-a", "n9-imaginary-1")
            .await
            .expect("404 is not an error");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_gpu_types() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/acceleratorTypes", ZONE_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "nvidia-tesla-t4", "maximumCardsPerInstance": 4},
                    {"name": "nvidia-l4", "maximumCardsPerInstance": 8}
                ]
            })))
            .mount(&server)
            .await;

        let gpus = catalog(&server).list_gpu_types("us-central1-a").await.unwrap();
        assert_eq!(gpus.len(), 2);
        assert!(gpus.contains("nvidia-tesla-t4"));
    }

    /// Quota is limit - usage; unreported metrics are not enforced
    #[tokio::test]
    async fn test_region_quota() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/regions/us-central1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "us-central1",
                "quotas": [
                    {"metric": "CPUS", "limit": 24.0, "usage": 8.0},
                    {"metric": "GPUS_NVIDIA_A100", "limit": 0.0, "usage": 0.0}
                ]
            })))
            .mount(&server)
            .await;

        let catalog = catalog(&server);
        assert!(catalog.check_quota("us-central1", "CPUS", 16).await.unwrap());
        assert!(!catalog.check_quota("us-central1", "CPUS", 17).await.unwrap());
        assert!(!catalog.check_quota("us-central1", "GPUS_NVIDIA_A100", 8).await.unwrap());
        assert!(catalog.check_quota("us-central1", "GPUS_NVIDIA_K80", 8).await.unwrap());
    }

    #[tokio::test]
    async fn test_zone_list_is_sorted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "us-central1-b", "status": "UP"},
                    {"name": "europe-west4-a", "status": "UP"}
                ]
            })))
            .mount(&server)
            .await;

        let zones = catalog(&server).list_zones().await.unwrap();
        assert_eq!(zones, vec!["europe-west4-a", "us-central1-b"]);
    }
}

mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_tpu_types() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tpu/v2/projects/test-project/locations/us-central2-b/acceleratorTypes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "acceleratorTypes": [
                    {"name": "projects/test-project/locations/us-central2-b/acceleratorTypes/v4-8", "type": "v4-8"},
                    {"name": "projects/test-project/locations/us-central2-b/acceleratorTypes/v4-16", "type": "v4-16"}
                ]
            })))
            .mount(&server)
            .await;

        let tpus = catalog(&server).list_tpu_types("us-central2-b").await.unwrap();
        assert!(tpus.contains("v4-8"));
        assert!(tpus.contains("v4-16"));
    }

    #[tokio::test]
    async fn test_storage_locations() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lustre/v1/projects/test-project/locations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "locations": [
                    {"name": "projects/test-project/locations/us-central1", "locationId": "us-central1"},
                    {"name": "projects/test-project/locations/europe-west4", "locationId": "europe-west4"}
                ]
            })))
            .mount(&server)
            .await;

        let regions = catalog(&server)
            .list_storage_region_availability(StorageFamily::Lustre)
            .await
            .unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions.contains("europe-west4"));
    }

    #[tokio::test]
    async fn test_billing_skus_with_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/billing/v1/services/{}/skus", COMPUTE_ENGINE_SERVICE_ID)))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "skus": [
                    {
                        "skuId": "0001",
                        "description": "N2 Instance Core running in Americas",
                        "serviceRegions": ["us-central1"],
                        "pricingInfo": [{"pricingExpression": {
                            "usageUnitDescription": "hour",
                            "tieredRates": [{"unitPrice": {"currencyCode": "USD", "units": "0", "nanos": 31611000}}]
                        }}]
                    },
                    {
                        "skuId": "0002",
                        "description": "Nvidia Tesla T4 GPU running in Americas",
                        "serviceRegions": ["us-central1"],
                        "pricingInfo": []
                    }
                ]
            })))
            .mount(&server)
            .await;

        let catalog = catalog(&server);

        let all = catalog.list_skus(COMPUTE_ENGINE_SERVICE_ID, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sku_id, "0001");

        let gpus = catalog
            .list_skus(COMPUTE_ENGINE_SERVICE_ID, Some("gpu"))
            .await
            .unwrap();
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].sku_id, "0002");
    }
}

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_403_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/acceleratorTypes", ZONE_PATH)))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Permission denied"}
            })))
            .mount(&server)
            .await;

        let err = catalog(&server)
            .list_gpu_types("us-central1-a")
            .await
            .unwrap_err();
        assert_eq!(
            format_gcp_error(&err),
            "Permission denied. Check your GCP IAM permissions."
        );
    }

    #[tokio::test]
    async fn test_cached_catalog_fetches_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/acceleratorTypes", ZONE_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "nvidia-tesla-t4"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cached = CachedCatalog::new(catalog(&server));
        let first = cached.list_gpu_types("us-central1-a").await.unwrap();
        let second = cached.list_gpu_types("us-central1-a").await.unwrap();
        assert_eq!(first, second);
    }
}
