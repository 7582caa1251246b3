//! Opaque key/value cache store used by the loader

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

/// Cache store errors
#[derive(Debug, Error)]
pub enum CacheStoreError {
    /// Backend could not be reached
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Backend reported a failure for the operation
    #[error("Cache operation failed: {0}")]
    Operation(String),
}

pub type StoreResult<T> = std::result::Result<T, CacheStoreError>;

/// Key/value store holding serialized datasets
///
/// Implementations may be network backed. Calls can block or fail; the
/// loader bounds them with a timeout and recovers from every error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Remove an entry. Returns whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn has_item(&self, key: &str) -> StoreResult<bool>;
}

/// Process-local store (thread-safe, lock-free)
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry
    pub fn flush(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn has_item(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.contains_key(key))
    }
}
