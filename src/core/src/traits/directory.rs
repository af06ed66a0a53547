//! Directory (identity) lookups

use crate::error::BackendResult;
use crate::types::{Identity, PrincipalKind};

/// Identity lookup by name and kind
pub trait DirectoryClient: Send + Sync {
    /// Look up a principal of the given kind.
    ///
    /// Returns `Ok(None)` when nothing, or more than one principal, matches;
    /// an ambiguous name is as unusable as a missing one.
    fn find_principal(&self, name: &str, kind: PrincipalKind) -> BackendResult<Option<Identity>>;
}
