//! Guards
//!
//! A guard protects the requests its [`Matcher`] selects with a role or
//! permission [`Requirement`]. The [`GuardChain`] evaluates guards in
//! registration order and falls back to the [`ProtectionPolicy`] when no
//! guard applies.

pub mod chain;
pub mod matcher;

pub use chain::{EvaluationStrategy, GuardChain};
pub use matcher::{ControllerMatcher, Matcher, RouteMatcher};

use crate::error::{AuthzError, Result};
use crate::types::{MatchMode, PermissionName, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Outcome when no guard matches a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionPolicy {
    /// Deny unmatched requests
    #[default]
    Deny,
    /// Allow unmatched requests
    Allow,
}

impl FromStr for ProtectionPolicy {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deny" => Ok(Self::Deny),
            "allow" => Ok(Self::Allow),
            other => Err(AuthzError::InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ProtectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deny => write!(f, "deny"),
            Self::Allow => write!(f, "allow"),
        }
    }
}

/// What a guard demands from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Role names, matched through inheritance
    Roles(BTreeSet<RoleName>),
    /// Permission names
    Permissions(BTreeSet<PermissionName>),
}

impl Requirement {
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RoleName>,
    {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }

    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PermissionName>,
    {
        Self::Permissions(permissions.into_iter().map(Into::into).collect())
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Roles(roles) => roles.is_empty(),
            Self::Permissions(permissions) => permissions.is_empty(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, names) = match self {
            Self::Roles(roles) => ("roles", roles),
            Self::Permissions(permissions) => ("permissions", permissions),
        };
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        write!(f, "{}[{}]", kind, names.join(","))
    }
}

/// Request as seen by the guards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Route name or path (e.g., "/admin/users")
    pub route: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl RequestDescriptor {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            controller: None,
            action: None,
        }
    }

    pub fn with_controller<A: Into<String>>(mut self, controller: impl Into<String>, action: Option<A>) -> Self {
        self.controller = Some(controller.into());
        self.action = action.map(Into::into);
        self
    }
}

/// Identity of a registered guard: its position and pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuardId {
    pub position: usize,
    pub pattern: String,
}

impl fmt::Display for GuardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.position, self.pattern)
    }
}

/// Immutable guard registered in a chain
#[derive(Clone)]
pub struct Guard {
    id: GuardId,
    matcher: Arc<dyn Matcher>,
    requirement: Requirement,
    mode: MatchMode,
}

impl Guard {
    pub(crate) fn new(
        position: usize,
        matcher: Arc<dyn Matcher>,
        requirement: Requirement,
        mode: MatchMode,
    ) -> Result<Self> {
        let pattern = matcher.describe();
        if requirement.is_empty() {
            return Err(AuthzError::InvalidGuard(format!(
                "guard '{}' has no required roles or permissions",
                pattern
            )));
        }

        Ok(Self {
            id: GuardId { position, pattern },
            matcher,
            requirement,
            mode,
        })
    }

    pub fn id(&self) -> &GuardId {
        &self.id
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn matches(&self, request: &RequestDescriptor) -> bool {
        self.matcher.matches(request)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("id", &self.id)
            .field("requirement", &self.requirement)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Why a request was allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllowReason {
    /// Matching guards were satisfied
    GuardSatisfied { guards: Vec<GuardId> },
    /// No guard matched and the policy allows
    DefaultPolicy,
}

/// Why a request was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// A matching guard's requirement was not met
    GuardRejected { guard: GuardId },
    /// No guard matched and the policy denies
    NoMatchingGuard,
    /// A matching guard could not be evaluated (deny policy only)
    EvaluationFailed { guard: GuardId, message: String },
}

/// Final guard chain outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "lowercase")]
pub enum GuardDecision {
    Allowed(AllowReason),
    Denied(DenyReason),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// Guard responsible for a denial, if any
    pub fn denied_by(&self) -> Option<&GuardId> {
        match self {
            Self::Denied(DenyReason::GuardRejected { guard })
            | Self::Denied(DenyReason::EvaluationFailed { guard, .. }) => Some(guard),
            _ => None,
        }
    }
}
