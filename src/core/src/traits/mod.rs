//! Authorization API client traits
//!
//! Calls are synchronous: each returns a success payload or a classifiable
//! [`BackendError`](crate::error::BackendError).

pub mod directory;
pub mod role;
pub mod lock;

// Re-export commonly used traits
pub use directory::DirectoryClient;
pub use role::RoleClient;
pub use lock::LockClient;

/// Everything a full provisioning or teardown run needs from a backend
pub trait AuthorizationClient: DirectoryClient + RoleClient + LockClient {}

impl<T: DirectoryClient + RoleClient + LockClient + ?Sized> AuthorizationClient for T {}
