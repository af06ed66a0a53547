//! # APIM Access Core
//!
//! Shared data model, backend error taxonomy and the Authorization API
//! client traits used by the reconciliation engine and its backends.
//!
//! The reconcilers never talk to a concrete service; they are written
//! against [`DirectoryClient`], [`RoleClient`] and [`LockClient`]. This crate
//! also ships [`InMemoryBackend`], a deterministic implementation of all
//! three with fault injection and simulated read-after-write lag.

pub mod types;
pub mod traits;
pub mod error;
pub mod memory;

// Re-export commonly used types
pub use error::{BackendError, BackendResult};
pub use memory::{InMemoryBackend, Operation};
pub use traits::{AuthorizationClient, DirectoryClient, LockClient, RoleClient};
pub use types::{
    Granularity, Identity, LockLevel, LockSnapshot, PrincipalKind, ResourceLock, RoleAssignment,
    RoleDefinition, RoleDefinitionRecord, RoleType,
};
