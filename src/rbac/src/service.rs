//! Authorization service
//!
//! Facade answering "may the current identity do X?". Decisions are computed
//! against an immutable [`RoleRegistry`] snapshot held in an atomically
//! swappable slot:
//!
//! ```text
//! is_granted → identity roles | guest role → snapshot ──→ registry traversal
//!                                              │ (empty or force reload)
//!                                              └→ LoaderCache → ProviderChain
//! ```
//!
//! Readers never lock. Lazy first builds are serialized by a mutex and
//! installed with a single pointer swap, so a reader sees either the old or
//! the new graph. Forced rebuilds skip the mutex. Cache write-back always
//! happens after the mutex is released.

use crate::assertion::{Assertion, AssertionContext};
use crate::error::Result;
use crate::identity::{Identity, IdentityProvider};
use crate::loader::{LoaderCache, LoaderStats};
use crate::registry::RoleRegistry;
use crate::types::{MatchMode, PermissionName, RoleName};
use arc_swap::ArcSwapOption;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Role name that matches every caller, guests included
pub const ANY_ROLE: &str = "*";

/// Authorization service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Role used when no identity is present
    pub guest_role: RoleName,

    /// Reload roles and permissions on every check
    pub force_reload: bool,

    /// Report unknown identity roles as `RoleNotFound` (only when missing
    /// roles are not auto-created)
    pub strict_role_lookup: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            guest_role: "guest".to_string(),
            force_reload: false,
            strict_role_lookup: false,
        }
    }
}

/// Authorization facade over the role registry
pub struct AuthorizationService {
    loader: LoaderCache,
    identity_provider: Arc<dyn IdentityProvider>,
    registry: ArcSwapOption<RoleRegistry>,
    rebuild: Mutex<()>,
    config: ServiceConfig,
}

impl AuthorizationService {
    pub fn new(
        loader: LoaderCache,
        identity_provider: Arc<dyn IdentityProvider>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            loader,
            identity_provider,
            registry: ArcSwapOption::empty(),
            rebuild: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    /// Current identity from the identity provider
    pub async fn current_identity(&self) -> Option<Arc<dyn Identity>> {
        self.identity_provider.identity().await
    }

    /// Role names a check runs with: the identity's roles, or the guest role
    pub fn effective_roles(&self, identity: Option<&dyn Identity>) -> Vec<RoleName> {
        match identity {
            Some(identity) => identity.roles(),
            None => vec![self.config.guest_role.clone()],
        }
    }

    /// Registry snapshot, building it on first use (or every time with `force_reload`)
    pub async fn registry(&self) -> Result<Arc<RoleRegistry>> {
        if self.config.force_reload {
            let registry = self.rebuild().await?;
            debug!("Role registry rebuilt for check ({} roles)", registry.len());
            return Ok(registry);
        }

        if let Some(registry) = self.registry.load_full() {
            return Ok(registry);
        }

        let guard = self.rebuild.lock().await;

        // Built by another task while we waited
        if let Some(registry) = self.registry.load_full() {
            return Ok(registry);
        }

        let loaded = self.loader.resolve(false).await?;
        let registry = self.install_if_empty(Arc::new(loaded.registry));
        drop(guard);

        if let Some(dataset) = &loaded.pending {
            self.loader.write_through(dataset).await;
        }
        Ok(registry)
    }

    /// Rebuild from the providers, bypassing the cache, and install the new snapshot
    pub async fn reload(&self) -> Result<Arc<RoleRegistry>> {
        let registry = self.rebuild().await?;
        info!("Role registry reloaded ({} roles)", registry.len());
        Ok(registry)
    }

    /// Drop the cached dataset and the resident snapshot; the next check rebuilds
    pub async fn invalidate(&self) {
        let _guard = self.rebuild.lock().await;

        self.loader.invalidate().await;
        self.registry.store(None);
        debug!("Role registry snapshot dropped");
    }

    /// Forced rebuild. Runs without the build lock, so concurrent checks
    /// under `force_reload` never queue behind each other or the store.
    async fn rebuild(&self) -> Result<Arc<RoleRegistry>> {
        let loaded = self.loader.resolve(true).await?;
        let registry = Arc::new(loaded.registry);
        self.registry.store(Some(registry.clone()));

        if let Some(dataset) = &loaded.pending {
            self.loader.write_through(dataset).await;
        }
        Ok(registry)
    }

    /// Install a lazily built snapshot unless a forced rebuild got there first
    fn install_if_empty(&self, registry: Arc<RoleRegistry>) -> Arc<RoleRegistry> {
        let previous = self
            .registry
            .compare_and_swap(&None::<Arc<RoleRegistry>>, Some(registry.clone()));

        match &*previous {
            Some(current) => current.clone(),
            None => registry,
        }
    }

    /// Whether the current identity is granted `permission`
    ///
    /// `Ok(false)` is an ordinary refusal. Errors come from a failed registry
    /// build, strict role lookup, or the assertion.
    pub async fn is_granted(&self, permission: &str, assertion: Option<&dyn Assertion>) -> Result<bool> {
        let identity = self.current_identity().await;
        self.is_granted_for(identity.as_deref(), permission, assertion)
            .await
    }

    /// Whether `identity` (or a guest, when `None`) is granted `permission`
    pub async fn is_granted_for(
        &self,
        identity: Option<&dyn Identity>,
        permission: &str,
        assertion: Option<&dyn Assertion>,
    ) -> Result<bool> {
        let roles = self.effective_roles(identity);
        let registry = self.registry().await?;

        if !self.check_permission(&registry, &roles, permission)? {
            return Ok(false);
        }

        let Some(assertion) = assertion else {
            return Ok(true);
        };

        let context = AssertionContext {
            permission,
            roles: &roles,
            identity,
        };
        let asserted = assertion.assert(&context)?;
        debug!("Assertion for '{}' returned {}", permission, asserted);
        Ok(asserted)
    }

    /// Whether `identity` holds the required roles, directly or through inheritance
    ///
    /// A requirement containing [`ANY_ROLE`] is always met.
    pub async fn matches_roles_for(
        &self,
        identity: Option<&dyn Identity>,
        required: &BTreeSet<RoleName>,
        mode: MatchMode,
    ) -> Result<bool> {
        if required.contains(ANY_ROLE) {
            return Ok(true);
        }

        let roles = self.effective_roles(identity);
        let registry = self.registry().await?;
        if self.config.strict_role_lookup {
            registry.ensure_roles(&roles)?;
        }

        let expanded = registry.expand_roles(&roles);
        Ok(mode.evaluate(required.iter().map(|role| expanded.contains(role))))
    }

    /// Whether `identity` is granted the required permissions
    pub async fn matches_permissions_for(
        &self,
        identity: Option<&dyn Identity>,
        required: &BTreeSet<PermissionName>,
        mode: MatchMode,
    ) -> Result<bool> {
        let roles = self.effective_roles(identity);
        let registry = self.registry().await?;

        let mut results = Vec::with_capacity(required.len());
        for permission in required {
            results.push(self.check_permission(&registry, &roles, permission)?);
        }
        Ok(mode.evaluate(results))
    }

    fn check_permission(&self, registry: &RoleRegistry, roles: &[RoleName], permission: &str) -> Result<bool> {
        if self.config.strict_role_lookup {
            registry.is_granted_strict(roles, permission)
        } else {
            Ok(registry.is_granted(roles, permission))
        }
    }
}
