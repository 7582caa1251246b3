//! Role registry
//!
//! Immutable role hierarchy built from a merged [`RbacDataset`]. Roles may
//! inherit from several parents and misconfigured data may contain cycles,
//! so every traversal keeps an explicit visited set.
//!
//! # Example
//!
//! ```rust
//! use cretoai_rbac::registry::RoleRegistry;
//! use cretoai_rbac::types::{RbacDataset, RoleDefinition};
//!
//! let mut dataset = RbacDataset::new();
//! dataset.merge_role(RoleDefinition::new("member").with_permission("read"));
//! dataset.merge_role(RoleDefinition::new("admin").with_parent("member"));
//!
//! let registry = RoleRegistry::build(&dataset, false).unwrap();
//! assert!(registry.is_granted(&["admin"], "read"));
//! ```

mod role;


pub use role::Role;

use crate::error::{AuthzError, Result};
use crate::types::{RbacDataset, RoleName};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// In-memory role hierarchy
///
/// Read-only once built. Share it behind an `Arc` and replace the whole
/// snapshot on reload.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    /// Adjacency: role name -> role (parents by name)
    roles: HashMap<RoleName, Role>,

    /// Whether unknown references were auto-created during build
    auto_create_missing: bool,
}

impl RoleRegistry {
    /// Build a registry from merged provider data
    ///
    /// # Errors
    ///
    /// Returns `RoleNotFound` if a parent role, or a role named by a permission
    /// grant, is not declared and `auto_create_missing` is false.
    pub fn build(dataset: &RbacDataset, auto_create_missing: bool) -> Result<Self> {
        let mut roles: HashMap<RoleName, Role> = dataset
            .roles
            .values()
            .map(|definition| (definition.name.clone(), Role::from_definition(definition)))
            .collect();

        let referenced = dataset
            .roles
            .values()
            .flat_map(|definition| definition.parents.iter())
            .chain(
                dataset
                    .permissions
                    .values()
                    .flat_map(|permission| permission.roles.iter()),
            );

        let mut created = 0usize;
        for name in referenced {
            if roles.contains_key(name) {
                continue;
            }
            if !auto_create_missing {
                return Err(AuthzError::RoleNotFound(name.clone()));
            }
            debug!("Auto-creating missing role '{}'", name);
            roles.insert(name.clone(), Role::placeholder(name.clone()));
            created += 1;
        }

        for permission in dataset.permissions.values() {
            for role_name in &permission.roles {
                if let Some(role) = roles.get_mut(role_name) {
                    role.grant(permission.name.clone());
                }
            }
        }

        info!(
            "Role registry built: {} roles ({} auto-created), {} permission definitions",
            roles.len(),
            created,
            dataset.permissions.len()
        );

        Ok(Self {
            roles,
            auto_create_missing,
        })
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn get_role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Like [`get_role`](Self::get_role) but reports a missing role as an error
    pub fn role(&self, name: &str) -> Result<&Role> {
        self.roles
            .get(name)
            .ok_or_else(|| AuthzError::RoleNotFound(name.to_string()))
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn auto_create_missing(&self) -> bool {
        self.auto_create_missing
    }

    /// Whether any of `role_names`, directly or through an ancestor, holds `permission`.
    ///
    /// Unknown role names grant nothing.
    pub fn is_granted<S: AsRef<str>>(&self, role_names: &[S], permission: &str) -> bool {
        let granted = self.traverse(role_names, |role| role.has_permission(permission));
        debug!(
            "Permission '{}' {} for {} role(s)",
            permission,
            if granted { "granted" } else { "not granted" },
            role_names.len()
        );
        granted
    }

    /// Strict variant of [`is_granted`](Self::is_granted).
    ///
    /// When missing roles are not auto-created, an unknown role in
    /// `role_names` is reported as `RoleNotFound` instead of granting nothing.
    pub fn is_granted_strict<S: AsRef<str>>(&self, role_names: &[S], permission: &str) -> Result<bool> {
        self.ensure_roles(role_names)?;
        Ok(self.is_granted(role_names, permission))
    }

    /// Fail with `RoleNotFound` for the first unknown role, unless missing
    /// roles are auto-created
    pub fn ensure_roles<S: AsRef<str>>(&self, role_names: &[S]) -> Result<()> {
        if self.auto_create_missing {
            return Ok(());
        }
        match role_names.iter().find(|name| !self.has_role(name.as_ref())) {
            Some(missing) => Err(AuthzError::RoleNotFound(missing.as_ref().to_string())),
            None => Ok(()),
        }
    }

    /// Closure of `role_names` over inheritance: the names themselves plus every ancestor
    pub fn expand_roles<S: AsRef<str>>(&self, role_names: &[S]) -> BTreeSet<RoleName> {
        let mut expanded: BTreeSet<RoleName> =
            role_names.iter().map(|name| name.as_ref().to_string()).collect();

        self.traverse(role_names, |role| {
            expanded.insert(role.name().to_string());
            false
        });

        expanded
    }

    /// Effective permissions of one role: direct grants plus those of all ancestors
    pub fn effective_permissions(&self, role_name: &str) -> BTreeSet<String> {
        let mut permissions = BTreeSet::new();

        self.traverse(&[role_name], |role| {
            permissions.extend(role.permissions().iter().cloned());
            false
        });

        permissions
    }

    /// Breadth-first walk over the seeded roles and their ancestors.
    ///
    /// Each role is visited at most once. Returns true as soon as `visit`
    /// returns true.
    fn traverse<'a, S, F>(&'a self, role_names: &[S], mut visit: F) -> bool
    where
        S: AsRef<str>,
        F: FnMut(&'a Role) -> bool,
    {
        let mut visited: HashSet<&'a str> = HashSet::new();
        let mut queue: VecDeque<&'a Role> = VecDeque::new();

        for name in role_names {
            if let Some((key, role)) = self.roles.get_key_value(name.as_ref()) {
                if visited.insert(key.as_str()) {
                    queue.push_back(role);
                }
            }
        }

        while let Some(role) = queue.pop_front() {
            if visit(role) {
                return true;
            }

            for parent in role.parents() {
                if let Some((key, parent_role)) = self.roles.get_key_value(parent) {
                    if visited.insert(key.as_str()) {
                        queue.push_back(parent_role);
                    }
                }
            }
        }

        false
    }
}
