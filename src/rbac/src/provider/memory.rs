//! In-memory providers backed by literal definitions or configuration

use super::{PermissionProvider, RoleProvider};
use crate::error::Result;
use crate::types::{PermissionDefinition, RoleDefinition};
use async_trait::async_trait;
use serde::Serialize;

/// BLAKE3 digest of the served definitions
fn fingerprint<T: Serialize>(definitions: &T) -> Option<String> {
    let bytes = bincode::serialize(definitions).ok()?;
    Some(blake3::hash(&bytes).to_hex().to_string())
}

/// Role provider serving a fixed list of role definitions
#[derive(Debug, Clone)]
pub struct InMemoryRoleProvider {
    id: String,
    roles: Vec<RoleDefinition>,
}

impl InMemoryRoleProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    /// Create a provider from an existing list of definitions
    pub fn from_roles(id: impl Into<String>, roles: Vec<RoleDefinition>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    pub fn with_role(mut self, role: RoleDefinition) -> Self {
        self.roles.push(role);
        self
    }
}

#[async_trait]
impl RoleProvider for InMemoryRoleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<String> {
        fingerprint(&self.roles)
    }

    async fn load_roles(&self) -> Result<Vec<RoleDefinition>> {
        Ok(self.roles.clone())
    }
}

/// Permission provider serving a fixed list of permission definitions
#[derive(Debug, Clone)]
pub struct InMemoryPermissionProvider {
    id: String,
    permissions: Vec<PermissionDefinition>,
}

impl InMemoryPermissionProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: Vec::new(),
        }
    }

    pub fn from_permissions(id: impl Into<String>, permissions: Vec<PermissionDefinition>) -> Self {
        Self {
            id: id.into(),
            permissions,
        }
    }

    pub fn with_permission(mut self, permission: PermissionDefinition) -> Self {
        self.permissions.push(permission);
        self
    }
}

#[async_trait]
impl PermissionProvider for InMemoryPermissionProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<String> {
        fingerprint(&self.permissions)
    }

    async fn load_permissions(&self) -> Result<Vec<PermissionDefinition>> {
        Ok(self.permissions.clone())
    }
}
