//! Role definition, role assignment and resource probe operations

use crate::error::BackendResult;
use crate::types::{Identity, RoleAssignment, RoleDefinition, RoleDefinitionRecord};

/// Role-definition and role-assignment management
pub trait RoleClient: Send + Sync {
    /// Find a role definition by its name, optionally restricted to a scope
    fn find_role_definition(
        &self,
        name: &str,
        scope: Option<&str>,
    ) -> BackendResult<Option<RoleDefinitionRecord>>;

    /// Fetch a role definition by backend id
    fn get_role_definition(&self, id: &str) -> BackendResult<Option<RoleDefinitionRecord>>;

    fn create_role_definition(&self, definition: &RoleDefinition) -> BackendResult<RoleDefinitionRecord>;

    /// Replace the definition stored under `id`
    fn update_role_definition(
        &self,
        id: &str,
        definition: &RoleDefinition,
    ) -> BackendResult<RoleDefinitionRecord>;

    fn delete_role_definition(&self, id: &str) -> BackendResult<()>;

    /// Assignments held by a principal.
    ///
    /// With `include_inherited`, assignments the principal receives through
    /// group membership are included as well.
    fn list_assignments_for_principal(
        &self,
        principal_id: &str,
        include_inherited: bool,
    ) -> BackendResult<Vec<RoleAssignment>>;

    /// Assignments of any principal that reference a role definition
    fn list_assignments_for_role(&self, role_definition_id: &str) -> BackendResult<Vec<RoleAssignment>>;

    fn create_assignment(
        &self,
        principal: &Identity,
        role_definition_id: &str,
        scope: &str,
    ) -> BackendResult<RoleAssignment>;

    fn delete_assignment(&self, assignment_id: &str) -> BackendResult<()>;

    /// Delete by `(principal, role name, scope)` when the assignment id is
    /// unknown or unusable
    fn delete_assignment_by_binding(
        &self,
        principal_id: &str,
        role_name: &str,
        scope: &str,
    ) -> BackendResult<()>;

    /// Probe whether a resource id exists
    fn resource_exists(&self, resource_id: &str) -> BackendResult<bool>;
}
