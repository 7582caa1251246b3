//! Core RBAC data types shared by providers, the chain and the registry

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Unique role name
pub type RoleName = String;

/// Unique permission name
pub type PermissionName = String;

/// How a set of required roles or permissions is satisfied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every entry must be satisfied
    #[default]
    All,
    /// At least one entry must be satisfied
    Any,
}

impl MatchMode {
    /// Fold per-entry results according to the mode
    pub fn evaluate<I: IntoIterator<Item = bool>>(self, results: I) -> bool {
        let mut results = results.into_iter();
        match self {
            MatchMode::All => results.all(|r| r),
            MatchMode::Any => results.any(|r| r),
        }
    }
}

/// Raw role definition as supplied by a role provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role name (e.g., "admin")
    pub name: RoleName,

    /// Roles this role inherits from
    #[serde(default)]
    pub parents: BTreeSet<RoleName>,

    /// Permissions granted directly to this role
    #[serde(default)]
    pub permissions: BTreeSet<PermissionName>,
}

impl RoleDefinition {
    /// Create a role with no parents and no permissions
    pub fn new(name: impl Into<RoleName>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a parent role
    pub fn with_parent(mut self, parent: impl Into<RoleName>) -> Self {
        self.parents.insert(parent.into());
        self
    }

    /// Add a directly granted permission
    pub fn with_permission(mut self, permission: impl Into<PermissionName>) -> Self {
        self.permissions.insert(permission.into());
        self
    }
}

/// Raw permission definition as supplied by a permission provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// Permission name (e.g., "article.edit")
    pub name: PermissionName,

    /// Roles the permission is granted to
    #[serde(default)]
    pub roles: BTreeSet<RoleName>,
}

impl PermissionDefinition {
    pub fn new(name: impl Into<PermissionName>) -> Self {
        Self {
            name: name.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Grant the permission to a role
    pub fn granted_to(mut self, role: impl Into<RoleName>) -> Self {
        self.roles.insert(role.into());
        self
    }
}

/// Merged role and permission data produced by the provider chain.
///
/// This is the unit stored in the loader cache. Ordered maps keep the
/// serialized form stable for identical inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacDataset {
    pub roles: BTreeMap<RoleName, RoleDefinition>,
    pub permissions: BTreeMap<PermissionName, PermissionDefinition>,
}

impl RbacDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a role definition. Parents and permissions of an existing role
    /// with the same name are extended, never replaced.
    pub fn merge_role(&mut self, role: RoleDefinition) {
        match self.roles.get_mut(&role.name) {
            Some(existing) => {
                existing.parents.extend(role.parents);
                existing.permissions.extend(role.permissions);
            }
            None => {
                self.roles.insert(role.name.clone(), role);
            }
        }
    }

    /// Merge a permission definition, unioning the roles it is granted to
    pub fn merge_permission(&mut self, permission: PermissionDefinition) {
        match self.permissions.get_mut(&permission.name) {
            Some(existing) => existing.roles.extend(permission.roles),
            None => {
                self.permissions.insert(permission.name.clone(), permission);
            }
        }
    }

    /// Number of declared roles
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of declared permissions
    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_mode_evaluate() {
        assert!(MatchMode::All.evaluate([true, true]));
        assert!(!MatchMode::All.evaluate([true, false]));
        assert!(MatchMode::Any.evaluate([false, true]));
        assert!(!MatchMode::Any.evaluate([false, false]));
    }

    #[test]
    fn test_role_definition_builder() {
        let role = RoleDefinition::new("admin")
            .with_parent("member")
            .with_permission("write");

        assert_eq!(role.name, "admin");
        assert!(role.parents.contains("member"));
        assert!(role.permissions.contains("write"));
    }

    #[test]
    fn test_merge_role_unions_sets() {
        let mut dataset = RbacDataset::new();
        dataset.merge_role(RoleDefinition::new("editor").with_permission("edit"));
        dataset.merge_role(
            RoleDefinition::new("editor")
                .with_parent("member")
                .with_permission("publish"),
        );

        let editor = &dataset.roles["editor"];
        assert_eq!(dataset.role_count(), 1);
        assert_eq!(editor.permissions.len(), 2);
        assert!(editor.parents.contains("member"));
    }

    #[test]
    fn test_merge_permission_unions_roles() {
        let mut dataset = RbacDataset::new();
        dataset.merge_permission(PermissionDefinition::new("read").granted_to("member"));
        dataset.merge_permission(PermissionDefinition::new("read").granted_to("guest"));

        assert_eq!(dataset.permission_count(), 1);
        assert_eq!(dataset.permissions["read"].roles.len(), 2);
    }
}
