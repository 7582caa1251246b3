//! Engine configuration
//!
//! Loaded from JSON. Every key is optional and unknown keys are ignored:
//!
//! ```json
//! {
//!   "guest_role": "guest",
//!   "create_missing_roles": true,
//!   "force_reload": false,
//!   "protection_policy": "deny",
//!   "guards": [
//!     { "type": "route", "pattern": "/admin/*", "permissions": ["write"], "mode": "all" }
//!   ],
//!   "role_providers": [
//!     { "id": "static", "roles": { "admin": { "parents": ["member"], "permissions": ["write"] } } }
//!   ],
//!   "cache": { "backend": "memory", "timeout_ms": 250 }
//! }
//! ```

use crate::error::{AuthzError, Result};
use crate::guard::{ControllerMatcher, EvaluationStrategy, Matcher, ProtectionPolicy, Requirement, RouteMatcher};
use crate::loader::{LoaderConfig, DEFAULT_STORE_TIMEOUT};
use crate::provider::{InMemoryPermissionProvider, InMemoryRoleProvider};
use crate::service::ServiceConfig;
use crate::types::{MatchMode, PermissionDefinition, RoleDefinition};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Role used when no identity is found
    pub guest_role: String,

    /// Create roles that are referenced but never declared
    pub create_missing_roles: bool,

    /// Reload roles and permissions on every check
    pub force_reload: bool,

    /// Report unknown identity roles as errors (needs `create_missing_roles = false`)
    pub strict_role_lookup: bool,

    /// "deny" or "allow", validated by [`RbacConfig::validate`]
    pub protection_policy: String,

    pub guard_strategy: EvaluationStrategy,

    /// Guards in evaluation order
    pub guards: Vec<GuardDefinition>,

    pub role_providers: Vec<RoleProviderDefinition>,

    pub permission_providers: Vec<PermissionProviderDefinition>,

    pub cache: CacheDefinition,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            guest_role: "guest".to_string(),
            create_missing_roles: true,
            force_reload: false,
            strict_role_lookup: false,
            protection_policy: ProtectionPolicy::Deny.to_string(),
            guard_strategy: EvaluationStrategy::default(),
            guards: Vec::new(),
            role_providers: Vec::new(),
            permission_providers: Vec::new(),
            cache: CacheDefinition::default(),
        }
    }
}

impl RbacConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| AuthzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every value that cannot be expressed by the types alone
    pub fn validate(&self) -> Result<()> {
        self.protection_policy()?;

        if self.guest_role.is_empty() {
            return Err(AuthzError::Config("guest_role cannot be empty".to_string()));
        }
        for guard in &self.guards {
            guard.requirement()?;
        }
        Ok(())
    }

    pub fn protection_policy(&self) -> Result<ProtectionPolicy> {
        self.protection_policy.parse()
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            guest_role: self.guest_role.clone(),
            force_reload: self.force_reload,
            strict_role_lookup: self.strict_role_lookup,
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            auto_create_missing: self.create_missing_roles,
            store_timeout: self.cache.timeout(),
        }
    }
}

/// Guard entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardDefinition {
    /// Route pattern guard
    Route {
        pattern: String,
        #[serde(default)]
        roles: Vec<String>,
        #[serde(default)]
        permissions: Vec<String>,
        #[serde(default)]
        mode: MatchMode,
    },
    /// Controller guard, optionally restricted to some actions
    Controller {
        controller: String,
        #[serde(default)]
        actions: Vec<String>,
        #[serde(default)]
        roles: Vec<String>,
        #[serde(default)]
        permissions: Vec<String>,
        #[serde(default)]
        mode: MatchMode,
    },
}

impl GuardDefinition {
    pub fn matcher(&self) -> Result<Arc<dyn Matcher>> {
        let matcher: Arc<dyn Matcher> = match self {
            Self::Route { pattern, .. } => Arc::new(RouteMatcher::new(pattern.clone())?),
            Self::Controller { controller, actions, .. } => {
                Arc::new(ControllerMatcher::new(controller.clone(), actions)?)
            }
        };
        Ok(matcher)
    }

    /// Exactly one of `roles` or `permissions` must be given
    pub fn requirement(&self) -> Result<Requirement> {
        let (roles, permissions) = match self {
            Self::Route { roles, permissions, .. } | Self::Controller { roles, permissions, .. } => {
                (roles, permissions)
            }
        };

        match (roles.is_empty(), permissions.is_empty()) {
            (false, true) => Ok(Requirement::roles(roles.iter().cloned())),
            (true, false) => Ok(Requirement::permissions(permissions.iter().cloned())),
            (true, true) => Err(AuthzError::InvalidGuard(format!(
                "{} needs roles or permissions",
                self.describe()
            ))),
            (false, false) => Err(AuthzError::InvalidGuard(format!(
                "{} cannot require both roles and permissions",
                self.describe()
            ))),
        }
    }

    pub fn mode(&self) -> MatchMode {
        match self {
            Self::Route { mode, .. } | Self::Controller { mode, .. } => *mode,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Route { pattern, .. } => format!("route guard '{}'", pattern),
            Self::Controller { controller, .. } => format!("controller guard '{}'", controller),
        }
    }
}

/// Role entry of an in-memory role provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleEntry {
    pub parents: Vec<String>,
    pub permissions: Vec<String>,
}

/// In-memory role provider: role name -> entry
#[derive(Debug, Clone, Deserialize)]
pub struct RoleProviderDefinition {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleEntry>,
}

impl RoleProviderDefinition {
    pub fn build(&self) -> InMemoryRoleProvider {
        let roles = self
            .roles
            .iter()
            .map(|(name, entry)| RoleDefinition {
                name: name.clone(),
                parents: entry.parents.iter().cloned().collect(),
                permissions: entry.permissions.iter().cloned().collect(),
            })
            .collect();

        InMemoryRoleProvider::from_roles(self.id.clone(), roles)
    }
}

/// In-memory permission provider: permission name -> roles granted
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionProviderDefinition {
    pub id: String,
    #[serde(default)]
    pub permissions: BTreeMap<String, Vec<String>>,
}

impl PermissionProviderDefinition {
    pub fn build(&self) -> InMemoryPermissionProvider {
        let permissions = self
            .permissions
            .iter()
            .map(|(name, roles)| PermissionDefinition {
                name: name.clone(),
                roles: roles.iter().cloned().collect(),
            })
            .collect();

        InMemoryPermissionProvider::from_permissions(self.id.clone(), permissions)
    }
}

/// Cache backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local memory store
    #[default]
    Memory,
    /// No caching: every load builds from the providers
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheDefinition {
    pub backend: CacheBackend,
    /// Time-out for each cache store call, in milliseconds
    pub timeout_ms: u64,
}

impl Default for CacheDefinition {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            timeout_ms: DEFAULT_STORE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl CacheDefinition {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
