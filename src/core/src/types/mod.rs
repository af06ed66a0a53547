//! Shared types for identity, role and lock reconciliation

pub mod identity;
pub mod role;
pub mod lock;

// Re-export commonly used types
pub use identity::{Identity, PrincipalKind};
pub use role::{Granularity, RoleAssignment, RoleDefinition, RoleDefinitionRecord, RoleType};
pub use lock::{LockLevel, LockSnapshot, ResourceLock};
