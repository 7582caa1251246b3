//! Loader cache tests
//!
//! Cache hits, forced reloads overwriting stale entries, and recovery from
//! unavailable or slow cache stores.

use async_trait::async_trait;
use cretoai_rbac::{
    loader::{CacheStoreError, StoreResult},
    provider::{InMemoryPermissionProvider, InMemoryRoleProvider},
    AuthorizationService, CacheStore, LoaderCache, LoaderConfig, MemoryCacheStore,
    PermissionDefinition, ProviderChain, RbacDataset, RoleDefinition, ServiceConfig, SimpleIdentity,
    StaticIdentityProvider,
};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

fn chain() -> ProviderChain {
    ProviderChain::new()
        .with_role_provider(Arc::new(
            InMemoryRoleProvider::new("static")
                .with_role(RoleDefinition::new("member").with_permission("read"))
                .with_role(RoleDefinition::new("admin").with_parent("member")),
        ))
        .with_permission_provider(Arc::new(
            InMemoryPermissionProvider::new("grants")
                .with_permission(PermissionDefinition::new("write").granted_to("admin")),
        ))
}

/// Dataset where nobody can do anything
fn stale_dataset() -> RbacDataset {
    let mut dataset = RbacDataset::new();
    dataset.merge_role(RoleDefinition::new("member"));
    dataset.merge_role(RoleDefinition::new("admin"));
    dataset
}

/// Store that is never reachable
struct UnavailableStore;

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> StoreResult<()> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }

    async fn has_item(&self, _key: &str) -> StoreResult<bool> {
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }
}

/// Store that answers after a delay
struct SlowStore {
    inner: MemoryCacheStore,
    delay: Duration,
}

#[async_trait]
impl CacheStore for SlowStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        sleep(self.delay).await;
        self.inner.delete(key).await
    }

    async fn has_item(&self, key: &str) -> StoreResult<bool> {
        sleep(self.delay).await;
        self.inner.has_item(key).await
    }
}

// ============================================================================
// CACHE HITS AND FORCED RELOADS
// ============================================================================

#[tokio::test]
async fn test_cache_hit_uses_stored_dataset() {
    let store = Arc::new(MemoryCacheStore::new());
    let loader = LoaderCache::new(chain(), Some(store.clone()), LoaderConfig::default());

    store
        .set(loader.key(), bincode::serialize(&stale_dataset()).unwrap())
        .await
        .unwrap();

    let registry = loader.load(false).await.unwrap();
    assert!(!registry.is_granted(&["admin"], "read"));
    assert_eq!(loader.stats().hits, 1);
    assert_eq!(loader.stats().builds, 0);
}

#[tokio::test]
async fn test_force_reload_is_never_stale() {
    let store = Arc::new(MemoryCacheStore::new());
    let loader = LoaderCache::new(chain(), Some(store.clone()), LoaderConfig::default());

    store
        .set(loader.key(), bincode::serialize(&stale_dataset()).unwrap())
        .await
        .unwrap();

    let registry = loader.load(true).await.unwrap();
    assert!(registry.is_granted(&["admin"], "read"));
    assert!(registry.is_granted(&["admin"], "write"));

    // The stale entry was overwritten
    let bytes = store.get(loader.key()).await.unwrap().unwrap();
    let cached: RbacDataset = bincode::deserialize(&bytes).unwrap();
    assert_eq!(cached, chain().aggregate().await.unwrap());

    let registry = loader.load(false).await.unwrap();
    assert!(registry.is_granted(&["admin"], "write"));
}

#[tokio::test]
async fn test_chains_use_distinct_keys() {
    let other = ProviderChain::new().with_role_provider(Arc::new(InMemoryRoleProvider::new("other")));

    let first = LoaderCache::new(chain(), None, LoaderConfig::default());
    let second = LoaderCache::new(other, None, LoaderConfig::default());
    let same = LoaderCache::new(chain(), None, LoaderConfig::default());

    assert_ne!(first.key(), second.key());
    assert_eq!(first.key(), same.key());
}

// ============================================================================
// CACHE FAILURES
// ============================================================================

#[tokio::test]
async fn test_unavailable_store_falls_back_to_providers() {
    let loader = LoaderCache::new(chain(), Some(Arc::new(UnavailableStore)), LoaderConfig::default());

    let registry = loader.load(false).await.unwrap();
    assert!(registry.is_granted(&["admin"], "write"));

    let stats = loader.stats();
    assert_eq!(stats.builds, 1);
    // Failed read and failed write-back
    assert_eq!(stats.failures, 2);
    assert!(!loader.is_cached().await);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = SlowStore {
        inner: MemoryCacheStore::new(),
        delay: Duration::from_millis(200),
    };
    let config = LoaderConfig {
        store_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let loader = LoaderCache::new(chain(), Some(Arc::new(store)), config);

    let registry = loader.load(false).await.unwrap();
    assert!(registry.is_granted(&["member"], "read"));
    assert_eq!(loader.stats().failures, 2);
}

// ============================================================================
// SERVICE SNAPSHOTS
// ============================================================================

#[tokio::test]
async fn test_service_reload_picks_up_fresh_data() {
    let store = Arc::new(MemoryCacheStore::new());
    let loader = LoaderCache::new(chain(), Some(store.clone()), LoaderConfig::default());
    store
        .set(loader.key(), bincode::serialize(&stale_dataset()).unwrap())
        .await
        .unwrap();

    let service = AuthorizationService::new(
        loader,
        Arc::new(StaticIdentityProvider::anonymous()),
        ServiceConfig::default(),
    );
    let admin = SimpleIdentity::new("user:alice").with_role("admin");

    assert!(!service.is_granted_for(Some(&admin), "write", None).await.unwrap());

    let before = service.registry().await.unwrap();
    service.reload().await.unwrap();
    let after = service.registry().await.unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(service.is_granted_for(Some(&admin), "write", None).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_checks_share_one_build() {
    let loader = LoaderCache::new(chain(), None, LoaderConfig::default());
    let service = Arc::new(AuthorizationService::new(
        loader,
        Arc::new(StaticIdentityProvider::anonymous()),
        ServiceConfig::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let member = SimpleIdentity::new("user:bob").with_role("member");
            service.is_granted_for(Some(&member), "read", None).await.unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(service.loader_stats().builds, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_forced_checks_do_not_queue_behind_write_back() {
    let delay = Duration::from_millis(150);
    let store = SlowStore {
        inner: MemoryCacheStore::new(),
        delay,
    };
    let config = LoaderConfig {
        store_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let loader = LoaderCache::new(chain(), Some(Arc::new(store)), config);
    let service = Arc::new(AuthorizationService::new(
        loader,
        Arc::new(StaticIdentityProvider::anonymous()),
        ServiceConfig {
            force_reload: true,
            ..Default::default()
        },
    ));

    let started = std::time::Instant::now();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let member = SimpleIdentity::new("user:bob").with_role("member");
            service.is_granted_for(Some(&member), "read", None).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    // Serialized write-backs would take 8 * 150ms
    assert!(started.elapsed() < delay * 4, "took {:?}", started.elapsed());
    assert_eq!(service.loader_stats().builds, 8);
    assert_eq!(service.loader_stats().failures, 0);
}
