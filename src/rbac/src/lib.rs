//! # CretoAI RBAC Engine
//!
//! Role-based access control with hierarchical roles and route guards.
//!
//! ## Features
//!
//! - **Pluggable providers** for roles and permissions, merged in order
//! - **Multiple inheritance** between roles, safe against cycles
//! - **Write-through caching** of provider data behind an async store
//! - **Lock-free decisions** against an atomically swapped role snapshot
//! - **Guards** on routes and controllers with a deny/allow fallback policy
//!
//! ## Example
//!
//! ```rust
//! use cretoai_rbac::{RbacConfig, RbacEngine, RequestDescriptor, SimpleIdentity, StaticIdentityProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RbacConfig::from_json_str(r#"{
//!         "guards": [ { "type": "route", "pattern": "/admin/*", "roles": ["admin"] } ],
//!         "role_providers": [ {
//!             "id": "static",
//!             "roles": { "admin": { "parents": ["member"] }, "member": { "permissions": ["read"] } }
//!         } ]
//!     }"#)?;
//!
//!     let engine = RbacEngine::start(&config, Arc::new(StaticIdentityProvider::anonymous())).await?;
//!     let alice = SimpleIdentity::new("user:alice").with_role("admin");
//!
//!     assert!(engine.is_granted_for(Some(&alice), "read", None).await?);
//!     assert!(engine.evaluate_for(Some(&alice), &RequestDescriptor::new("/admin/users")).await?.is_allowed());
//!
//!     Ok(())
//! }
//! ```

pub mod assertion;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod identity;
pub mod loader;
pub mod provider;
pub mod registry;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use assertion::{assertion_fn, Assertion, AssertionContext, AssertionError};
pub use config::RbacConfig;
pub use engine::RbacEngine;
pub use error::{AuthzError, Result};
pub use guard::{
    AllowReason, DenyReason, EvaluationStrategy, GuardChain, GuardDecision, GuardId, ProtectionPolicy,
    RequestDescriptor, Requirement,
};
pub use identity::{Identity, IdentityProvider, SimpleIdentity, StaticIdentityProvider};
pub use loader::{CacheStore, Loaded, LoaderCache, LoaderConfig, MemoryCacheStore};
pub use provider::{PermissionProvider, ProviderChain, RoleProvider};
pub use registry::{Role, RoleRegistry};
pub use service::{AuthorizationService, ServiceConfig, ANY_ROLE};
pub use types::{MatchMode, PermissionDefinition, RbacDataset, RoleDefinition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
