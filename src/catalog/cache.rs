//! Memoizing Catalog Provider
//!
//! Wraps one provider (one project) and keeps every successful answer for the
//! lifetime of the wrapper. There is no eviction: catalog data is stable over a
//! CLI run. Failures are not cached and quota checks always go to the inner
//! provider.

use super::{AcceleratorPairings, CatalogProvider, MachineTypeDetails, Sku};
use crate::blueprint::StorageFamily;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use tokio::sync::RwLock;

type Memo<K, V> = RwLock<HashMap<K, V>>;

/// Process-lifetime cache in front of a [`CatalogProvider`]
pub struct CachedCatalog<P> {
    inner: P,
    machine_types: Memo<String, HashSet<String>>,
    gpu_types: Memo<String, HashSet<String>>,
    tpu_types: Memo<String, HashSet<String>>,
    machine_details: Memo<(String, String), Option<MachineTypeDetails>>,
    pairings: Memo<String, AcceleratorPairings>,
    storage_regions: Memo<StorageFamily, HashSet<String>>,
    skus: Memo<(String, Option<String>), Vec<Sku>>,
    zones: Memo<(), Vec<String>>,
}

impl<P> CachedCatalog<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            machine_types: RwLock::default(),
            gpu_types: RwLock::default(),
            tpu_types: RwLock::default(),
            machine_details: RwLock::default(),
            pairings: RwLock::default(),
            storage_regions: RwLock::default(),
            skus: RwLock::default(),
            zones: RwLock::default(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

async fn memoize<K, V, F, Fut>(memo: &Memo<K, V>, key: K, fetch: F) -> Result<V>
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
{
    {
        let cache = memo.read().await;
        if let Some(value) = cache.get(&key) {
            return Ok(value.clone());
        }
    }

    let value = fetch().await?;

    {
        let mut cache = memo.write().await;
        cache.insert(key, value.clone());
    }

    Ok(value)
}

impl<P: CatalogProvider> CatalogProvider for CachedCatalog<P> {
    async fn list_machine_types(&self, zone: &str) -> Result<HashSet<String>> {
        memoize(&self.machine_types, zone.to_string(), || {
            self.inner.list_machine_types(zone)
        })
        .await
    }

    async fn list_gpu_types(&self, zone: &str) -> Result<HashSet<String>> {
        memoize(&self.gpu_types, zone.to_string(), || self.inner.list_gpu_types(zone)).await
    }

    async fn list_tpu_types(&self, zone: &str) -> Result<HashSet<String>> {
        memoize(&self.tpu_types, zone.to_string(), || self.inner.list_tpu_types(zone)).await
    }

    async fn get_machine_type_details(
        &self,
        zone: &str,
        machine_type: &str,
    ) -> Result<Option<MachineTypeDetails>> {
        memoize(
            &self.machine_details,
            (zone.to_string(), machine_type.to_string()),
            || self.inner.get_machine_type_details(zone, machine_type),
        )
        .await
    }

    async fn get_accelerator_pairings(&self, zone: &str) -> Result<AcceleratorPairings> {
        memoize(&self.pairings, zone.to_string(), || {
            self.inner.get_accelerator_pairings(zone)
        })
        .await
    }

    async fn list_storage_region_availability(
        &self,
        family: StorageFamily,
    ) -> Result<HashSet<String>> {
        memoize(&self.storage_regions, family, || {
            self.inner.list_storage_region_availability(family)
        })
        .await
    }

    async fn check_quota(&self, region: &str, bucket: &str, required: u64) -> Result<bool> {
        self.inner.check_quota(region, bucket, required).await
    }

    async fn list_skus(&self, service_id: &str, filter: Option<&str>) -> Result<Vec<Sku>> {
        memoize(
            &self.skus,
            (service_id.to_string(), filter.map(str::to_string)),
            || self.inner.list_skus(service_id, filter),
        )
        .await
    }

    async fn list_zones(&self) -> Result<Vec<String>> {
        memoize(&self.zones, (), || self.inner.list_zones()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls; the first listing of `flaky-zone` fails
    #[derive(Default)]
    struct CountingCatalog {
        calls: AtomicUsize,
        quota_calls: AtomicUsize,
    }

    impl CatalogProvider for CountingCatalog {
        async fn list_machine_types(&self, zone: &str) -> Result<HashSet<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if zone == "flaky-zone" && n == 0 {
                return Err(anyhow::anyhow!("API request failed: 503"));
            }
            Ok(HashSet::from([format!("n2-standard-4@{}", zone)]))
        }

        async fn list_gpu_types(&self, _zone: &str) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }

        async fn list_tpu_types(&self, _zone: &str) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }

        async fn get_machine_type_details(
            &self,
            _zone: &str,
            _machine_type: &str,
        ) -> Result<Option<MachineTypeDetails>> {
            Ok(None)
        }

        async fn get_accelerator_pairings(&self, _zone: &str) -> Result<AcceleratorPairings> {
            Ok(AcceleratorPairings::new())
        }

        async fn list_storage_region_availability(
            &self,
            _family: StorageFamily,
        ) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }

        async fn check_quota(&self, _region: &str, _bucket: &str, _required: u64) -> Result<bool> {
            self.quota_calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn list_skus(&self, _service_id: &str, _filter: Option<&str>) -> Result<Vec<Sku>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_repeated_queries_hit_cache() {
        let cached = CachedCatalog::new(CountingCatalog::default());

        let first = cached.list_machine_types("us-central1-a").await.unwrap();
        let second = cached.list_machine_types("us-central1-a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

        cached.list_machine_types("us-central1-b").await.unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cached = CachedCatalog::new(CountingCatalog::default());

        assert!(cached.list_machine_types("flaky-zone").await.is_err());
        assert!(cached.list_machine_types("flaky-zone").await.is_ok());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_quota_checks_are_not_cached() {
        let cached = CachedCatalog::new(CountingCatalog::default());

        cached.check_quota("us-central1", "CPUS", 8).await.unwrap();
        cached.check_quota("us-central1", "CPUS", 8).await.unwrap();
        assert_eq!(cached.inner().quota_calls.load(Ordering::SeqCst), 2);
    }
}
