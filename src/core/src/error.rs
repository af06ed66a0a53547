//! Classifiable errors returned by authorization backends
//!
//! Every backend call either succeeds or fails with a [`BackendError`] whose
//! variant tells the reconcilers how to react: authorization problems abort,
//! propagation lag is retried, validation problems fail the unit of work.

use thiserror::Error;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Error returned by an Authorization API client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The caller lacks permission for the operation
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The target does not exist (or is not visible yet)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A role definition cannot be deleted while assignments reference it
    #[error("Role definition still has assignments: {0}")]
    HasAssignments(String),

    /// The write collides with an existing object
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request is permanently invalid (bad scope, bad role)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Throttling, propagation lag or a server-side hiccup
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Anything the backend did not let us classify
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Create an authorization-denied error
    pub fn denied<S: Into<String>>(msg: S) -> Self {
        BackendError::AuthorizationDenied(msg.into())
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        BackendError::NotFound(msg.into())
    }

    /// Create a transient error
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        BackendError::Transient(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        BackendError::Validation(msg.into())
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, BackendError::AuthorizationDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BackendError::Validation(_))
    }

    /// Whether another attempt after a wait could succeed.
    ///
    /// Unrecognized errors count as retryable; authorization and validation
    /// failures never do.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            BackendError::AuthorizationDenied(_) | BackendError::Validation(_)
        )
    }
}
