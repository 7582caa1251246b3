//! Role and permission providers
//!
//! A provider supplies the complete role or permission dataset of one
//! source. Providers are composed by the [`ProviderChain`], which merges
//! their results into a single [`RbacDataset`](crate::types::RbacDataset).
//!
//! # Example
//!
//! ```rust
//! use cretoai_rbac::provider::{InMemoryRoleProvider, ProviderChain};
//! use cretoai_rbac::types::RoleDefinition;
//! use std::sync::Arc;
//!
//! # async fn example() -> cretoai_rbac::Result<()> {
//! let provider = InMemoryRoleProvider::new("static")
//!     .with_role(RoleDefinition::new("member").with_permission("read"));
//!
//! let chain = ProviderChain::new().with_role_provider(Arc::new(provider));
//! let dataset = chain.aggregate().await?;
//! assert!(dataset.roles.contains_key("member"));
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod memory;

pub use chain::ProviderChain;
pub use memory::{InMemoryPermissionProvider, InMemoryRoleProvider};

use crate::error::Result;
use crate::types::{PermissionDefinition, RoleDefinition};
use async_trait::async_trait;

/// Source of role definitions
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Stable identifier of this provider, used for error reporting and cache keys
    fn id(&self) -> &str;

    /// Fingerprint of the data currently served, folded into the cache key.
    ///
    /// Providers whose data can change under the same id should return a
    /// value that changes with it. `None` keys the cache on the id alone.
    fn version(&self) -> Option<String> {
        None
    }

    /// Load the complete set of roles known to this provider
    async fn load_roles(&self) -> Result<Vec<RoleDefinition>>;
}

/// Source of permission definitions
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Stable identifier of this provider, used for error reporting and cache keys
    fn id(&self) -> &str;

    /// Fingerprint of the data currently served, folded into the cache key.
    ///
    /// Providers whose data can change under the same id should return a
    /// value that changes with it. `None` keys the cache on the id alone.
    fn version(&self) -> Option<String> {
        None
    }

    /// Load the complete set of permissions known to this provider
    async fn load_permissions(&self) -> Result<Vec<PermissionDefinition>>;
}
