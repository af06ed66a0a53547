//! Resource group lock operations

use crate::error::BackendResult;
use crate::types::{LockLevel, ResourceLock};

/// Lock list/create/delete by resource group and lock name
pub trait LockClient: Send + Sync {
    /// List the locks defined directly on a resource group
    fn list_locks(&self, resource_group: &str) -> BackendResult<Vec<ResourceLock>>;

    /// Create (or overwrite) a lock with the given name
    fn create_lock(
        &self,
        resource_group: &str,
        name: &str,
        level: LockLevel,
        notes: Option<&str>,
    ) -> BackendResult<ResourceLock>;

    fn delete_lock(&self, resource_group: &str, name: &str) -> BackendResult<()>;
}
