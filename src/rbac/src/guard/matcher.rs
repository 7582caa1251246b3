//! Request matchers used by guards

use super::RequestDescriptor;
use crate::error::{AuthzError, Result};
use regex::Regex;
use std::collections::BTreeSet;

/// Decides whether a guard applies to a request
pub trait Matcher: Send + Sync {
    fn matches(&self, request: &RequestDescriptor) -> bool;

    /// Human readable pattern, used in guard ids and logs
    fn describe(&self) -> String;
}

/// Matches the request route against a wildcard pattern
///
/// `*` matches any run of characters, everything else is literal:
/// `/admin/*` matches `/admin/users` and `/admin/users/42`, not `/admin`.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    pattern: String,
    regex: Regex,
}

impl RouteMatcher {
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(AuthzError::InvalidGuard("route pattern cannot be empty".to_string()));
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| AuthzError::InvalidGuard(format!("route pattern '{}': {}", pattern, e)))?;

        Ok(Self { pattern, regex })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Matcher for RouteMatcher {
    fn matches(&self, request: &RequestDescriptor) -> bool {
        self.regex.is_match(&request.route)
    }

    fn describe(&self) -> String {
        format!("route:{}", self.pattern)
    }
}

/// Matches a controller and, optionally, a set of its actions
///
/// Names compare case-insensitively. An empty action set covers every action.
#[derive(Debug, Clone)]
pub struct ControllerMatcher {
    controller: String,
    actions: BTreeSet<String>,
}

impl ControllerMatcher {
    pub fn new<I, S>(controller: impl Into<String>, actions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let controller = controller.into().to_lowercase();
        if controller.is_empty() {
            return Err(AuthzError::InvalidGuard("controller name cannot be empty".to_string()));
        }

        let actions = actions
            .into_iter()
            .map(|action| action.as_ref().to_lowercase())
            .collect();

        Ok(Self { controller, actions })
    }
}

impl Matcher for ControllerMatcher {
    fn matches(&self, request: &RequestDescriptor) -> bool {
        let Some(controller) = &request.controller else {
            return false;
        };
        if controller.to_lowercase() != self.controller {
            return false;
        }
        if self.actions.is_empty() {
            return true;
        }

        request
            .action
            .as_ref()
            .map(|action| self.actions.contains(&action.to_lowercase()))
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        if self.actions.is_empty() {
            format!("controller:{}", self.controller)
        } else {
            let actions: Vec<&str> = self.actions.iter().map(String::as_str).collect();
            format!("controller:{}[{}]", self.controller, actions.join(","))
        }
    }
}
