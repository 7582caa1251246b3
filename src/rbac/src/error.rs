//! Error types for the RBAC engine

use thiserror::Error;

/// RBAC engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A role or permission provider failed to supply its dataset
    #[error("Provider '{provider}' failed to load: {message}")]
    ProviderLoad { provider: String, message: String },

    /// A referenced role does not exist and missing roles are not auto-created
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// Protection policy other than "deny" or "allow"
    #[error("Invalid protection policy: can only be \"deny\" or \"allow\", \"{0}\" given")]
    InvalidPolicy(String),

    /// Malformed guard definition
    #[error("Invalid guard: {0}")]
    InvalidGuard(String),

    /// Malformed configuration document
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache store could not serve the request. Recovered inside the loader.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// An assertion callback failed while evaluating a contextual permission
    #[error("Assertion failed: {0}")]
    Assertion(#[from] crate::assertion::AssertionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Wrap a provider failure with the provider's id
    pub fn provider_load(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ProviderLoad {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for RBAC operations
pub type Result<T> = std::result::Result<T, AuthzError>;
