//! Ordered aggregation of role and permission providers

use super::{PermissionProvider, RoleProvider};
use crate::error::{AuthzError, Result};
use crate::types::{PermissionDefinition, RbacDataset, RoleDefinition};
use blake3::Hasher;
use std::sync::Arc;
use tracing::debug;

/// Prefix of every loader cache key
const CACHE_KEY_PREFIX: &str = "rbac:dataset:";

/// Aggregates an ordered list of providers into one merged dataset
///
/// Merge rules:
/// - The same role name in several providers: parents and permissions are unioned
/// - The same permission name in several providers: granted roles are unioned
/// - Any provider error aborts the whole aggregation with `ProviderLoad`
#[derive(Clone, Default)]
pub struct ProviderChain {
    role_providers: Vec<Arc<dyn RoleProvider>>,
    permission_providers: Vec<Arc<dyn PermissionProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role_provider(mut self, provider: Arc<dyn RoleProvider>) -> Self {
        self.role_providers.push(provider);
        self
    }

    pub fn with_permission_provider(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permission_providers.push(provider);
        self
    }

    pub fn add_role_provider(&mut self, provider: Arc<dyn RoleProvider>) {
        self.role_providers.push(provider);
    }

    pub fn add_permission_provider(&mut self, provider: Arc<dyn PermissionProvider>) {
        self.permission_providers.push(provider);
    }

    /// Total number of registered providers
    pub fn len(&self) -> usize {
        self.role_providers.len() + self.permission_providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load every provider in order and merge the results
    pub async fn aggregate(&self) -> Result<RbacDataset> {
        let mut role_sets = Vec::with_capacity(self.role_providers.len());
        for provider in &self.role_providers {
            let roles = provider
                .load_roles()
                .await
                .map_err(|e| AuthzError::provider_load(provider.id(), e))?;
            debug!("Role provider '{}' supplied {} roles", provider.id(), roles.len());
            role_sets.push(roles);
        }

        let mut permission_sets = Vec::with_capacity(self.permission_providers.len());
        for provider in &self.permission_providers {
            let permissions = provider
                .load_permissions()
                .await
                .map_err(|e| AuthzError::provider_load(provider.id(), e))?;
            debug!(
                "Permission provider '{}' supplied {} permissions",
                provider.id(),
                permissions.len()
            );
            permission_sets.push(permissions);
        }

        Ok(Self::merge(role_sets, permission_sets))
    }

    /// Merge provider results in order. Later sets extend earlier ones.
    pub fn merge<R, P>(role_sets: R, permission_sets: P) -> RbacDataset
    where
        R: IntoIterator<Item = Vec<RoleDefinition>>,
        P: IntoIterator<Item = Vec<PermissionDefinition>>,
    {
        let mut dataset = RbacDataset::new();

        for role in role_sets.into_iter().flatten() {
            dataset.merge_role(role);
        }
        for permission in permission_sets.into_iter().flatten() {
            dataset.merge_permission(permission);
        }

        dataset
    }

    /// Cache key identifying this chain
    ///
    /// BLAKE3 over the ordered provider ids and their data versions, so
    /// chains sharing a store only share entries when they serve the same data.
    pub fn cache_key(&self) -> String {
        let mut hasher = Hasher::new();

        hasher.update(b"roles");
        for provider in &self.role_providers {
            Self::hash_provider(&mut hasher, provider.id(), provider.version());
        }

        hasher.update(b"permissions");
        for provider in &self.permission_providers {
            Self::hash_provider(&mut hasher, provider.id(), provider.version());
        }

        format!("{}{}", CACHE_KEY_PREFIX, hasher.finalize().to_hex())
    }

    fn hash_provider(hasher: &mut Hasher, id: &str, version: Option<String>) {
        hasher.update(&[0]);
        hasher.update(id.as_bytes());
        if let Some(version) = version {
            hasher.update(&[1]);
            hasher.update(version.as_bytes());
        }
    }
}
