//! Ordered guard evaluation

use super::{
    AllowReason, DenyReason, Guard, GuardDecision, GuardId, Matcher, ProtectionPolicy, RequestDescriptor,
    Requirement, RouteMatcher,
};
use crate::error::{AuthzError, Result};
use crate::identity::Identity;
use crate::service::AuthorizationService;
use crate::types::MatchMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// How matching guards combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
    /// The first matching guard decides
    #[default]
    FirstMatch,
    /// Every matching guard must be satisfied
    AllMatching,
}

/// Guards evaluated against the authorization service
///
/// ```text
/// Idle → Evaluating ─┬→ Allowed  (matching guard satisfied, or no match + allow policy)
///                    └→ Denied   (matching guard unsatisfied, or no match + deny policy)
/// ```
pub struct GuardChain {
    guards: Vec<Guard>,
    policy: ProtectionPolicy,
    strategy: EvaluationStrategy,
    service: Arc<AuthorizationService>,
}

impl GuardChain {
    pub fn new(service: Arc<AuthorizationService>, policy: ProtectionPolicy) -> Self {
        Self {
            guards: Vec::new(),
            policy,
            strategy: EvaluationStrategy::default(),
            service,
        }
    }

    pub fn with_strategy(mut self, strategy: EvaluationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn policy(&self) -> ProtectionPolicy {
        self.policy
    }

    pub fn strategy(&self) -> EvaluationStrategy {
        self.strategy
    }

    pub fn service(&self) -> &Arc<AuthorizationService> {
        &self.service
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// Register a guard after the existing ones
    pub fn register(
        &mut self,
        matcher: Arc<dyn Matcher>,
        requirement: Requirement,
        mode: MatchMode,
    ) -> Result<GuardId> {
        let guard = Guard::new(self.guards.len(), matcher, requirement, mode)?;
        let id = guard.id().clone();

        debug!("Registered guard {} requiring {} ({:?})", id, guard.requirement(), mode);
        self.guards.push(guard);
        Ok(id)
    }

    /// Register a guard on a route pattern
    pub fn register_route(
        &mut self,
        pattern: &str,
        requirement: Requirement,
        mode: MatchMode,
    ) -> Result<GuardId> {
        self.register(Arc::new(RouteMatcher::new(pattern)?), requirement, mode)
    }

    /// Evaluate a request for the service's current identity
    pub async fn evaluate(&self, request: &RequestDescriptor) -> Result<GuardDecision> {
        let identity = self.service.current_identity().await;
        self.evaluate_for(identity.as_deref(), request).await
    }

    /// Evaluate a request for `identity` (a guest when `None`)
    ///
    /// Errors are only returned under the allow policy. Under the deny policy
    /// a guard that fails to evaluate denies the request.
    pub async fn evaluate_for(
        &self,
        identity: Option<&dyn Identity>,
        request: &RequestDescriptor,
    ) -> Result<GuardDecision> {
        let mut satisfied = Vec::new();

        for guard in self.guards.iter().filter(|guard| guard.matches(request)) {
            debug!("Guard {} matches route '{}'", guard.id(), request.route);

            match self.check(guard, identity).await {
                Ok(true) => satisfied.push(guard.id().clone()),
                Ok(false) => {
                    warn!(
                        "Guard {} denied route '{}': requires {}",
                        guard.id(),
                        request.route,
                        guard.requirement()
                    );
                    return Ok(GuardDecision::Denied(DenyReason::GuardRejected {
                        guard: guard.id().clone(),
                    }));
                }
                Err(e) => return self.on_error(guard, e),
            }

            if self.strategy == EvaluationStrategy::FirstMatch {
                break;
            }
        }

        if !satisfied.is_empty() {
            return Ok(GuardDecision::Allowed(AllowReason::GuardSatisfied { guards: satisfied }));
        }

        debug!(
            "No guard matches route '{}', applying {} policy",
            request.route, self.policy
        );
        Ok(match self.policy {
            ProtectionPolicy::Deny => GuardDecision::Denied(DenyReason::NoMatchingGuard),
            ProtectionPolicy::Allow => GuardDecision::Allowed(AllowReason::DefaultPolicy),
        })
    }

    async fn check(&self, guard: &Guard, identity: Option<&dyn Identity>) -> Result<bool> {
        match guard.requirement() {
            Requirement::Roles(roles) => {
                self.service
                    .matches_roles_for(identity, roles, guard.mode())
                    .await
            }
            Requirement::Permissions(permissions) => {
                self.service
                    .matches_permissions_for(identity, permissions, guard.mode())
                    .await
            }
        }
    }

    fn on_error(&self, guard: &Guard, error: AuthzError) -> Result<GuardDecision> {
        match self.policy {
            ProtectionPolicy::Deny => {
                warn!("Guard {} failed to evaluate, denying: {}", guard.id(), error);
                Ok(GuardDecision::Denied(DenyReason::EvaluationFailed {
                    guard: guard.id().clone(),
                    message: error.to_string(),
                }))
            }
            ProtectionPolicy::Allow => Err(error),
        }
    }
}
