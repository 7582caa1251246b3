//! Cached registry loader
//!
//! Wraps the provider chain and the registry build with an opaque cache
//! store. Cache problems never block a build: every store failure, time-out
//! or undecodable payload is logged and the registry is built directly from
//! the providers.

pub mod store;

pub use store::{CacheStore, CacheStoreError, MemoryCacheStore, StoreResult};

use crate::error::{AuthzError, Result};
use crate::provider::ProviderChain;
use crate::registry::RoleRegistry;
use crate::types::RbacDataset;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound for a single cache store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Auto-create roles that are referenced but not declared
    pub auto_create_missing: bool,

    /// Time-out applied to every cache store call
    pub store_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            auto_create_missing: true,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Loader statistics
#[derive(Debug, Clone, Default)]
pub struct LoaderStats {
    pub hits: usize,
    pub misses: usize,
    /// Store calls that failed, timed out or returned undecodable data
    pub failures: usize,
    /// Registries built from provider data
    pub builds: usize,
}

impl LoaderStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Result of [`LoaderCache::resolve`]
#[derive(Debug)]
pub struct Loaded {
    pub registry: RoleRegistry,

    /// Freshly built dataset still to be written to the store
    pub pending: Option<RbacDataset>,
}

/// Builds role registries through the provider chain with write-through caching
pub struct LoaderCache {
    chain: ProviderChain,
    store: Option<Arc<dyn CacheStore>>,
    key: String,
    config: LoaderConfig,
    stats: Arc<DashMap<&'static str, usize>>,
}

impl LoaderCache {
    /// Create a loader. Without a store every load builds from the providers.
    pub fn new(chain: ProviderChain, store: Option<Arc<dyn CacheStore>>, config: LoaderConfig) -> Self {
        let key = chain.cache_key();
        Self {
            chain,
            store,
            key,
            config,
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Cache key of the provider chain
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Return a registry, from cache when possible, writing fresh builds back
    ///
    /// With `force_reload` the cache is bypassed, the providers are reloaded
    /// and the cache entry is overwritten.
    pub async fn load(&self, force_reload: bool) -> Result<RoleRegistry> {
        let loaded = self.resolve(force_reload).await?;
        if let Some(dataset) = &loaded.pending {
            self.write_through(dataset).await;
        }
        Ok(loaded.registry)
    }

    /// Same as [`load`](Self::load) without the write-back
    ///
    /// A freshly built dataset is returned in [`Loaded::pending`] so the
    /// caller can store it with [`write_through`](Self::write_through) once it
    /// holds no lock.
    pub async fn resolve(&self, force_reload: bool) -> Result<Loaded> {
        if !force_reload {
            if let Some(store) = &self.store {
                match self.fetch(store.as_ref()).await {
                    Ok(Some(dataset)) => {
                        self.increment_stat("hits");
                        debug!("Loader cache hit for {}", self.key);
                        return Ok(Loaded {
                            registry: RoleRegistry::build(&dataset, self.config.auto_create_missing)?,
                            pending: None,
                        });
                    }
                    Ok(None) => {
                        self.increment_stat("misses");
                        debug!("Loader cache miss for {}", self.key);
                    }
                    Err(e) => {
                        self.increment_stat("failures");
                        warn!("{}, building registry from providers", e);
                    }
                }
            }
        } else {
            debug!("Forced reload of roles and permissions");
        }

        let dataset = self.chain.aggregate().await?;
        let registry = RoleRegistry::build(&dataset, self.config.auto_create_missing)?;
        self.increment_stat("builds");

        Ok(Loaded {
            registry,
            pending: self.store.as_ref().map(|_| dataset),
        })
    }

    /// Store a dataset under this chain's key. Failures are logged and counted.
    pub async fn write_through(&self, dataset: &RbacDataset) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = self.save(store.as_ref(), dataset).await {
            self.increment_stat("failures");
            warn!("{}, registry not cached", e);
        }
    }

    /// Whether the store currently holds an entry for this chain
    pub async fn is_cached(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        match tokio::time::timeout(self.config.store_timeout, store.has_item(&self.key)).await {
            Ok(Ok(present)) => present,
            Ok(Err(e)) => {
                warn!("Cache lookup failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Cache lookup timed out");
                false
            }
        }
    }

    /// Drop the cached entry so the next load rebuilds
    pub async fn invalidate(&self) {
        let Some(store) = &self.store else {
            return;
        };

        match tokio::time::timeout(self.config.store_timeout, store.delete(&self.key)).await {
            Ok(Ok(removed)) => debug!("Loader cache invalidated (entry existed: {})", removed),
            Ok(Err(e)) => warn!("Cache invalidation failed: {}", e),
            Err(_) => warn!("Cache invalidation timed out"),
        }
    }

    /// Get loader statistics
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            failures: self.get_stat("failures"),
            builds: self.get_stat("builds"),
        }
    }

    async fn fetch(&self, store: &dyn CacheStore) -> Result<Option<RbacDataset>> {
        let bytes = tokio::time::timeout(self.config.store_timeout, store.get(&self.key))
            .await
            .map_err(|_| self.timed_out("get"))?
            .map_err(|e| AuthzError::CacheUnavailable(e.to_string()))?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| AuthzError::CacheUnavailable(format!("undecodable cache entry: {}", e)))
    }

    async fn save(&self, store: &dyn CacheStore, dataset: &RbacDataset) -> Result<()> {
        let bytes = bincode::serialize(dataset).map_err(|e| AuthzError::Serialization(e.to_string()))?;

        tokio::time::timeout(self.config.store_timeout, store.set(&self.key, bytes))
            .await
            .map_err(|_| self.timed_out("set"))?
            .map_err(|e| AuthzError::CacheUnavailable(e.to_string()))
    }

    fn timed_out(&self, operation: &str) -> AuthzError {
        AuthzError::CacheUnavailable(format!(
            "cache {} timed out after {:?}",
            operation, self.config.store_timeout
        ))
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}
