//! Configuration-driven engine assembly
//!
//! ```text
//! RbacConfig ─→ ProviderChain ─→ LoaderCache ─→ AuthorizationService ─→ GuardChain
//!                                    ▲
//!                               CacheStore (memory | none | caller supplied)
//! ```

use crate::assertion::Assertion;
use crate::config::{CacheBackend, RbacConfig};
use crate::error::Result;
use crate::guard::{GuardChain, GuardDecision, RequestDescriptor};
use crate::identity::{Identity, IdentityProvider};
use crate::loader::{CacheStore, LoaderCache, MemoryCacheStore};
use crate::provider::ProviderChain;
use crate::registry::RoleRegistry;
use crate::service::AuthorizationService;
use std::sync::Arc;
use tracing::info;

/// Authorization service plus its guard chain
pub struct RbacEngine {
    service: Arc<AuthorizationService>,
    guards: GuardChain,
}

impl RbacEngine {
    /// Build an engine and its role registry, surfacing provider and
    /// missing-role errors before the first check
    pub async fn start(config: &RbacConfig, identity_provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        let engine = Self::from_config(config, identity_provider)?;
        engine.init().await?;
        Ok(engine)
    }

    /// [`RbacEngine::start`] with a caller supplied cache store
    pub async fn start_with_store(
        config: &RbacConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        store: Option<Arc<dyn CacheStore>>,
    ) -> Result<Self> {
        let engine = Self::with_store(config, identity_provider, store)?;
        engine.init().await?;
        Ok(engine)
    }

    /// Build the role registry now instead of on the first check
    pub async fn init(&self) -> Result<()> {
        let registry = self.service.registry().await?;
        info!("Role registry built ({} roles)", registry.len());
        Ok(())
    }

    /// Build an engine from configuration, using the configured cache backend
    ///
    /// The role registry is built lazily on the first check. Use
    /// [`RbacEngine::start`] or [`RbacEngine::init`] to build it up front.
    pub fn from_config(config: &RbacConfig, identity_provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        let store: Option<Arc<dyn CacheStore>> = match config.cache.backend {
            CacheBackend::Memory => Some(Arc::new(MemoryCacheStore::new())),
            CacheBackend::None => None,
        };
        Self::with_store(config, identity_provider, store)
    }

    /// Build an engine from configuration with a caller supplied cache store
    pub fn with_store(
        config: &RbacConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        store: Option<Arc<dyn CacheStore>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut chain = ProviderChain::new();
        for provider in &config.role_providers {
            chain.add_role_provider(Arc::new(provider.build()));
        }
        for provider in &config.permission_providers {
            chain.add_permission_provider(Arc::new(provider.build()));
        }

        let loader = LoaderCache::new(chain, store, config.loader_config());
        let service = Arc::new(AuthorizationService::new(
            loader,
            identity_provider,
            config.service_config(),
        ));

        let mut guards = GuardChain::new(service.clone(), config.protection_policy()?)
            .with_strategy(config.guard_strategy);
        for definition in &config.guards {
            guards.register(definition.matcher()?, definition.requirement()?, definition.mode())?;
        }

        info!(
            "RBAC engine ready: {} providers, {} guards, {} policy",
            config.role_providers.len() + config.permission_providers.len(),
            guards.guards().len(),
            guards.policy()
        );

        Ok(Self { service, guards })
    }

    pub fn service(&self) -> &Arc<AuthorizationService> {
        &self.service
    }

    pub fn guards(&self) -> &GuardChain {
        &self.guards
    }

    /// Mutable guard chain, for guards registered in code
    pub fn guards_mut(&mut self) -> &mut GuardChain {
        &mut self.guards
    }

    pub async fn is_granted(&self, permission: &str, assertion: Option<&dyn Assertion>) -> Result<bool> {
        self.service.is_granted(permission, assertion).await
    }

    pub async fn is_granted_for(
        &self,
        identity: Option<&dyn Identity>,
        permission: &str,
        assertion: Option<&dyn Assertion>,
    ) -> Result<bool> {
        self.service.is_granted_for(identity, permission, assertion).await
    }

    pub async fn evaluate(&self, request: &RequestDescriptor) -> Result<GuardDecision> {
        self.guards.evaluate(request).await
    }

    pub async fn evaluate_for(
        &self,
        identity: Option<&dyn Identity>,
        request: &RequestDescriptor,
    ) -> Result<GuardDecision> {
        self.guards.evaluate_for(identity, request).await
    }

    /// Reload roles and permissions from the providers
    pub async fn reload(&self) -> Result<Arc<RoleRegistry>> {
        self.service.reload().await
    }

    pub async fn invalidate(&self) {
        self.service.invalidate().await
    }
}
