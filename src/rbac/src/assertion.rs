//! Assertion callbacks for contextual permission checks
//!
//! An assertion refines a role-based grant with request-specific data, for
//! example "the identity owns this article". The engine never inspects that
//! data: the caller captures it inside the assertion.

use crate::identity::Identity;
use thiserror::Error;

/// Errors raised by assertions
#[derive(Debug, Error)]
pub enum AssertionError {
    /// The assertion received data of an unexpected shape
    #[error("Invalid assertion context: {0}")]
    InvalidContext(String),

    /// The assertion could not reach a verdict
    #[error("{0}")]
    Failed(String),
}

/// Data handed to an assertion once the role check has passed
#[derive(Clone, Copy)]
pub struct AssertionContext<'a> {
    /// Permission being checked
    pub permission: &'a str,

    /// Effective role names of the caller (identity roles or the guest role)
    pub roles: &'a [String],

    /// Current identity, absent for guests
    pub identity: Option<&'a dyn Identity>,
}

/// Contextual check evaluated after the role-based grant
pub trait Assertion: Send + Sync {
    fn assert(&self, context: &AssertionContext<'_>) -> Result<bool, AssertionError>;
}

impl<F> Assertion for F
where
    F: Fn(&AssertionContext<'_>) -> Result<bool, AssertionError> + Send + Sync,
{
    fn assert(&self, context: &AssertionContext<'_>) -> Result<bool, AssertionError> {
        self(context)
    }
}

/// Build an assertion from a closure, pinning its signature to the
/// higher-ranked form [`Assertion`] expects
pub fn assertion_fn<F>(f: F) -> F
where
    F: Fn(&AssertionContext<'_>) -> Result<bool, AssertionError> + Send + Sync,
{
    f
}
