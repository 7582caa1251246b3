//! Role node of the registry graph

use crate::types::{PermissionName, RoleDefinition, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A role inside a built registry
///
/// Parents are stored by name; the registry owns the adjacency and resolves
/// names on traversal, so the graph may contain cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: RoleName,
    parents: BTreeSet<RoleName>,
    permissions: BTreeSet<PermissionName>,
    auto_created: bool,
}

impl Role {
    pub(crate) fn from_definition(definition: &RoleDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            parents: definition.parents.clone(),
            permissions: definition.permissions.clone(),
            auto_created: false,
        }
    }

    /// Empty role created for a name referenced but never declared
    pub(crate) fn placeholder(name: impl Into<RoleName>) -> Self {
        Self {
            name: name.into(),
            parents: BTreeSet::new(),
            permissions: BTreeSet::new(),
            auto_created: true,
        }
    }

    pub(crate) fn grant(&mut self, permission: impl Into<PermissionName>) {
        self.permissions.insert(permission.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &BTreeSet<RoleName> {
        &self.parents
    }

    /// Permissions granted directly to this role (no inheritance)
    pub fn permissions(&self) -> &BTreeSet<PermissionName> {
        &self.permissions
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Whether the role was created because it was referenced but not declared
    pub fn is_auto_created(&self) -> bool {
        self.auto_created
    }
}
