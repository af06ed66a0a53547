//! Error types for the reconciliation engine

use apim_access_core::{BackendError, PrincipalKind};
use thiserror::Error;

/// Fatal reconciliation errors
///
/// Anything that only affects one unit of work (one scope, one lock, one
/// assignment) is recorded in a [`RunReport`](crate::RunReport) instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed input at the process boundary
    #[error("Invalid input: {0}")]
    Input(String),

    /// Neither principal kind resolved
    #[error("Could not resolve identity '{identity}' as a {hinted} or a {alternate}")]
    IdentityResolution {
        identity: String,
        hinted: PrincipalKind,
        alternate: PrincipalKind,
    },

    /// The assignable scope set ended up empty
    #[error("No valid target scopes: {0}")]
    ScopeValidation(String),

    /// The caller is not allowed to perform an operation
    #[error("Authorization denied: {0}")]
    Authorization(String),

    /// A required unit of work kept failing
    #[error("Retries exhausted for {unit} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        unit: String,
        attempts: u32,
        last_error: BackendError,
    },

    /// A synthesized definition would grant a denied action
    #[error("Role '{role}' would grant denied action '{action}'")]
    LeastPrivilege { role: String, action: String },

    /// Non-retryable backend failure on a required unit of work
    #[error("Backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for ReconcileError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::AuthorizationDenied(msg) => ReconcileError::Authorization(msg),
            other => ReconcileError::Backend(other),
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
