//! Identity abstraction
//!
//! The engine only needs the role names assigned to the current identity.
//! How the identity is obtained (session, token, ...) is up to the
//! [`IdentityProvider`] implementation.

use crate::types::RoleName;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authenticated identity
pub trait Identity: Send + Sync {
    /// Role names assigned to the identity
    fn roles(&self) -> Vec<RoleName>;
}

/// Source of the current identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current identity, or `None` for an anonymous caller
    async fn identity(&self) -> Option<Arc<dyn Identity>>;
}

/// Plain identity with an id and a list of roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleIdentity {
    /// Identity identifier (e.g., "user:alice@example.com")
    pub id: String,

    #[serde(default)]
    pub roles: Vec<RoleName>,
}

impl SimpleIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<RoleName>) -> Self {
        self.roles.push(role.into());
        self
    }
}

impl Identity for SimpleIdentity {
    fn roles(&self) -> Vec<RoleName> {
        self.roles.clone()
    }
}

/// Identity provider returning whatever identity was last set
#[derive(Default)]
pub struct StaticIdentityProvider {
    identity: RwLock<Option<Arc<dyn Identity>>>,
}

impl StaticIdentityProvider {
    /// Provider with no identity: every caller is a guest
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Arc<dyn Identity>) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    /// Replace the current identity (`None` logs out)
    pub async fn set_identity(&self, identity: Option<Arc<dyn Identity>>) {
        *self.identity.write().await = identity;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn identity(&self) -> Option<Arc<dyn Identity>> {
        self.identity.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_switches_identity() {
        let provider = StaticIdentityProvider::anonymous();
        assert!(provider.identity().await.is_none());

        let alice = SimpleIdentity::new("user:alice").with_role("admin");
        provider.set_identity(Some(Arc::new(alice))).await;

        let identity = provider.identity().await.unwrap();
        assert_eq!(identity.roles(), vec!["admin".to_string()]);

        provider.set_identity(None).await;
        assert!(provider.identity().await.is_none());
    }
}
