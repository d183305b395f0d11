//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is terminal for the request that produced it; the API layer
/// maps them onto HTTP status codes (400 / 403 / 401 / 404).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A state precondition or input check failed. The message is meant for
    /// the client.
    #[error("{0}")]
    Validation(String),

    /// The actor's role or ownership does not allow the action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The action requires an authenticated actor.
    #[error("authentication credentials were not provided")]
    Unauthenticated,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The target entity does not exist (or is not visible to the actor).
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
