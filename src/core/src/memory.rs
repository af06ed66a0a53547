//! In-memory authorization backend
//!
//! A deterministic stand-in for the real service. Besides storing state it
//! can:
//!
//! - fail the next N calls of an [`Operation`] with queued errors,
//! - hide freshly created assignments from the next N reads (read-after-write
//!   lag),
//! - record every call so tests can assert what was (not) attempted.
//!
//! Unlike the real service it happily stores duplicate assignments, which
//! makes duplicate creation by a reconciler observable.

use crate::error::{BackendError, BackendResult};
use crate::traits::{DirectoryClient, LockClient, RoleClient};
use crate::types::{
    Identity, LockLevel, PrincipalKind, ResourceLock, RoleAssignment, RoleDefinition,
    RoleDefinitionRecord, RoleType,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Backend operations that can be recorded and fault-injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindPrincipal,
    FindRoleDefinition,
    GetRoleDefinition,
    CreateRoleDefinition,
    UpdateRoleDefinition,
    DeleteRoleDefinition,
    ListAssignments,
    CreateAssignment,
    DeleteAssignment,
    DeleteAssignmentByBinding,
    ResourceExists,
    ListLocks,
    CreateLock,
    DeleteLock,
}

#[derive(Debug, Clone)]
struct StoredAssignment {
    assignment: RoleAssignment,
    /// Reads left before the assignment becomes visible
    hidden_reads: usize,
}

#[derive(Debug, Default)]
struct State {
    principals: Vec<Identity>,
    /// group id -> member principal ids
    memberships: HashMap<String, Vec<String>>,
    role_definitions: BTreeMap<String, RoleDefinitionRecord>,
    assignments: Vec<StoredAssignment>,
    resources: Vec<String>,
    /// resource group -> locks, in creation order
    locks: BTreeMap<String, Vec<ResourceLock>>,
    faults: HashMap<Operation, VecDeque<BackendError>>,
    calls: Vec<Operation>,
    read_lag: usize,
    next_id: u64,
}

impl State {
    fn enter(&mut self, op: Operation) -> BackendResult<()> {
        self.calls.push(op);
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Visible assignments matching `filter`; hidden matches burn one read.
    fn read_assignments<F>(&mut self, filter: F) -> Vec<RoleAssignment>
    where
        F: Fn(&RoleAssignment) -> bool,
    {
        let mut visible = Vec::new();
        for stored in self.assignments.iter_mut().filter(|s| filter(&s.assignment)) {
            if stored.hidden_reads > 0 {
                stored.hidden_reads -= 1;
            } else {
                visible.push(stored.assignment.clone());
            }
        }
        visible
    }

    fn groups_of(&self, principal_id: &str) -> Vec<String> {
        self.memberships
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == principal_id))
            .map(|(group, _)| group.clone())
            .collect()
    }
}

/// In-memory implementation of every client trait
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user principal
    pub fn with_user(self, id: &str, user_principal_name: &str) -> Self {
        self.state.lock().principals.push(Identity::user(id, user_principal_name));
        self
    }

    /// Register a group principal
    pub fn with_group(self, id: &str, display_name: &str) -> Self {
        self.state.lock().principals.push(Identity::group(id, display_name));
        self
    }

    /// Make `member_id` a member of `group_id`
    pub fn with_member(self, group_id: &str, member_id: &str) -> Self {
        self.state
            .lock()
            .memberships
            .entry(group_id.to_string())
            .or_default()
            .push(member_id.to_string());
        self
    }

    /// Register an existing resource id for existence probes
    pub fn with_resource(self, resource_id: &str) -> Self {
        self.state.lock().resources.push(resource_id.to_string());
        self
    }

    /// Register a built-in role definition
    pub fn with_builtin_role(self, id: &str, name: &str) -> Self {
        self.state.lock().role_definitions.insert(
            id.to_string(),
            RoleDefinitionRecord {
                id: id.to_string(),
                role_type: RoleType::BuiltIn,
                definition: RoleDefinition::new(name),
            },
        );
        self
    }

    /// Register an existing custom role definition
    pub fn with_custom_role(self, id: &str, definition: RoleDefinition) -> Self {
        self.state.lock().role_definitions.insert(
            id.to_string(),
            RoleDefinitionRecord {
                id: id.to_string(),
                role_type: RoleType::Custom,
                definition,
            },
        );
        self
    }

    /// Register an existing, immediately visible assignment
    pub fn with_assignment(self, id: &str, role_definition_id: &str, principal_id: &str, scope: &str) -> Self {
        self.state.lock().assignments.push(StoredAssignment {
            assignment: RoleAssignment {
                id: id.to_string(),
                role_definition_id: role_definition_id.to_string(),
                principal_id: principal_id.to_string(),
                scope: scope.to_string(),
            },
            hidden_reads: 0,
        });
        self
    }

    /// Register an existing lock on a resource group
    pub fn with_lock(self, resource_group: &str, lock: ResourceLock) -> Self {
        self.state
            .lock()
            .locks
            .entry(resource_group.to_string())
            .or_default()
            .push(lock);
        self
    }

    /// Hide every assignment created from now on for `reads` matching reads
    pub fn with_read_lag(self, reads: usize) -> Self {
        self.state.lock().read_lag = reads;
        self
    }

    /// Fail the next call of `op` with `error` (queued behind earlier faults)
    pub fn inject_fault(&self, op: Operation, error: BackendError) {
        self.state.lock().faults.entry(op).or_default().push_back(error);
    }

    /// Fail the next `times` calls of `op` with clones of `error`
    pub fn inject_faults(&self, op: Operation, error: BackendError, times: usize) {
        for _ in 0..times {
            self.inject_fault(op, error.clone());
        }
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Every stored assignment, ignoring read lag
    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.state
            .lock()
            .assignments
            .iter()
            .map(|s| s.assignment.clone())
            .collect()
    }

    /// Every stored role definition
    pub fn role_definitions(&self) -> Vec<RoleDefinitionRecord> {
        self.state.lock().role_definitions.values().cloned().collect()
    }

    /// Current locks on a resource group
    pub fn locks(&self, resource_group: &str) -> Vec<ResourceLock> {
        self.state
            .lock()
            .locks
            .get(resource_group)
            .cloned()
            .unwrap_or_default()
    }
}

impl DirectoryClient for InMemoryBackend {
    fn find_principal(&self, name: &str, kind: PrincipalKind) -> BackendResult<Option<Identity>> {
        let mut state = self.state.lock();
        state.enter(Operation::FindPrincipal)?;

        let matches: Vec<&Identity> = state
            .principals
            .iter()
            .filter(|p| p.kind == kind)
            .filter(|p| p.display_name.eq_ignore_ascii_case(name) || p.id == name)
            .collect();

        Ok(match matches.as_slice() {
            [single] => Some((*single).clone()),
            _ => None,
        })
    }
}

impl RoleClient for InMemoryBackend {
    fn find_role_definition(
        &self,
        name: &str,
        scope: Option<&str>,
    ) -> BackendResult<Option<RoleDefinitionRecord>> {
        let mut state = self.state.lock();
        state.enter(Operation::FindRoleDefinition)?;

        Ok(state
            .role_definitions
            .values()
            .filter(|r| r.name() == name)
            .find(|r| match scope {
                // Built-in roles are assignable everywhere
                Some(scope) if r.is_custom() => r
                    .definition
                    .assignable_scopes
                    .iter()
                    .any(|s| scope.to_ascii_lowercase().starts_with(&s.to_ascii_lowercase())),
                _ => true,
            })
            .cloned())
    }

    fn get_role_definition(&self, id: &str) -> BackendResult<Option<RoleDefinitionRecord>> {
        let mut state = self.state.lock();
        state.enter(Operation::GetRoleDefinition)?;
        Ok(state.role_definitions.get(id).cloned())
    }

    fn create_role_definition(&self, definition: &RoleDefinition) -> BackendResult<RoleDefinitionRecord> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateRoleDefinition)?;

        if definition.assignable_scopes.is_empty() {
            return Err(BackendError::validation("assignableScopes must not be empty"));
        }
        if state.role_definitions.values().any(|r| r.name() == definition.name) {
            return Err(BackendError::Conflict(format!(
                "role definition '{}' already exists",
                definition.name
            )));
        }

        let id = state.next_id("rd");
        let record = RoleDefinitionRecord {
            id: id.clone(),
            role_type: RoleType::Custom,
            definition: definition.clone(),
        };
        state.role_definitions.insert(id, record.clone());
        Ok(record)
    }

    fn update_role_definition(
        &self,
        id: &str,
        definition: &RoleDefinition,
    ) -> BackendResult<RoleDefinitionRecord> {
        let mut state = self.state.lock();
        state.enter(Operation::UpdateRoleDefinition)?;

        if definition.assignable_scopes.is_empty() {
            return Err(BackendError::validation("assignableScopes must not be empty"));
        }
        let record = state
            .role_definitions
            .get_mut(id)
            .ok_or_else(|| BackendError::not_found(format!("role definition {}", id)))?;
        if !record.is_custom() {
            return Err(BackendError::validation("built-in roles cannot be modified"));
        }
        record.definition = definition.clone();
        Ok(record.clone())
    }

    fn delete_role_definition(&self, id: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteRoleDefinition)?;

        let record = state
            .role_definitions
            .get(id)
            .ok_or_else(|| BackendError::not_found(format!("role definition {}", id)))?;
        if !record.is_custom() {
            return Err(BackendError::validation("built-in roles cannot be deleted"));
        }
        if state.assignments.iter().any(|s| s.assignment.role_definition_id == id) {
            return Err(BackendError::HasAssignments(id.to_string()));
        }
        state.role_definitions.remove(id);
        Ok(())
    }

    fn list_assignments_for_principal(
        &self,
        principal_id: &str,
        include_inherited: bool,
    ) -> BackendResult<Vec<RoleAssignment>> {
        let mut state = self.state.lock();
        state.enter(Operation::ListAssignments)?;

        let mut principals = vec![principal_id.to_string()];
        if include_inherited {
            principals.extend(state.groups_of(principal_id));
        }
        Ok(state.read_assignments(|a| principals.contains(&a.principal_id)))
    }

    fn list_assignments_for_role(&self, role_definition_id: &str) -> BackendResult<Vec<RoleAssignment>> {
        let mut state = self.state.lock();
        state.enter(Operation::ListAssignments)?;
        Ok(state.read_assignments(|a| a.role_definition_id == role_definition_id))
    }

    fn create_assignment(
        &self,
        principal: &Identity,
        role_definition_id: &str,
        scope: &str,
    ) -> BackendResult<RoleAssignment> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateAssignment)?;

        if !state.role_definitions.contains_key(role_definition_id) {
            return Err(BackendError::not_found(format!(
                "role definition {}",
                role_definition_id
            )));
        }

        let assignment = RoleAssignment {
            id: state.next_id("ra"),
            role_definition_id: role_definition_id.to_string(),
            principal_id: principal.id.clone(),
            scope: scope.to_string(),
        };
        let hidden_reads = state.read_lag;
        state.assignments.push(StoredAssignment {
            assignment: assignment.clone(),
            hidden_reads,
        });
        Ok(assignment)
    }

    fn delete_assignment(&self, assignment_id: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteAssignment)?;

        let before = state.assignments.len();
        state.assignments.retain(|s| s.assignment.id != assignment_id);
        if state.assignments.len() == before {
            return Err(BackendError::not_found(format!("role assignment {}", assignment_id)));
        }
        Ok(())
    }

    fn delete_assignment_by_binding(
        &self,
        principal_id: &str,
        role_name: &str,
        scope: &str,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteAssignmentByBinding)?;

        let role_ids: Vec<String> = state
            .role_definitions
            .values()
            .filter(|r| r.name() == role_name)
            .map(|r| r.id.clone())
            .collect();

        let before = state.assignments.len();
        state.assignments.retain(|s| {
            let a = &s.assignment;
            !(a.principal_id == principal_id
                && a.scope.eq_ignore_ascii_case(scope)
                && role_ids.contains(&a.role_definition_id))
        });
        if state.assignments.len() == before {
            return Err(BackendError::not_found(format!(
                "no assignment of '{}' to {} at {}",
                role_name, principal_id, scope
            )));
        }
        Ok(())
    }

    fn resource_exists(&self, resource_id: &str) -> BackendResult<bool> {
        let mut state = self.state.lock();
        state.enter(Operation::ResourceExists)?;
        Ok(state
            .resources
            .iter()
            .any(|r| r.eq_ignore_ascii_case(resource_id)))
    }
}

impl LockClient for InMemoryBackend {
    fn list_locks(&self, resource_group: &str) -> BackendResult<Vec<ResourceLock>> {
        let mut state = self.state.lock();
        state.enter(Operation::ListLocks)?;
        Ok(state.locks.get(resource_group).cloned().unwrap_or_default())
    }

    fn create_lock(
        &self,
        resource_group: &str,
        name: &str,
        level: LockLevel,
        notes: Option<&str>,
    ) -> BackendResult<ResourceLock> {
        let mut state = self.state.lock();
        state.enter(Operation::CreateLock)?;

        if !level.is_concrete() {
            return Err(BackendError::validation(format!("invalid lock level for {}", name)));
        }

        let lock = ResourceLock {
            id: Some(format!(
                "/resourceGroups/{}/providers/Microsoft.Authorization/locks/{}",
                resource_group, name
            )),
            level: Some(level),
            name: Some(name.to_string()),
            notes: notes.map(str::to_string),
        };
        let locks = state.locks.entry(resource_group.to_string()).or_default();
        match locks.iter_mut().find(|l| l.name.as_deref() == Some(name)) {
            Some(existing) => *existing = lock.clone(),
            None => locks.push(lock.clone()),
        }
        Ok(lock)
    }

    fn delete_lock(&self, resource_group: &str, name: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter(Operation::DeleteLock)?;

        let locks = state.locks.entry(resource_group.to_string()).or_default();
        let before = locks.len();
        locks.retain(|l| l.name.as_deref() != Some(name));
        if locks.len() == before {
            return Err(BackendError::not_found(format!("lock {} on {}", name, resource_group)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_user("u-1", "alice@contoso.com")
            .with_group("g-1", "api-editors")
            .with_member("g-1", "u-1")
            .with_builtin_role("rd-reader", "API Management Service Reader Role")
    }

    #[test]
    fn test_find_principal_by_kind() {
        let backend = backend();
        let user = backend.find_principal("alice@contoso.com", PrincipalKind::User).unwrap();
        assert_eq!(user.unwrap().id, "u-1");

        let none = backend.find_principal("alice@contoso.com", PrincipalKind::Group).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_ambiguous_principal_is_not_resolved() {
        let backend = backend().with_group("g-2", "api-editors");
        let result = backend.find_principal("api-editors", PrincipalKind::Group).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_injected_faults_are_consumed_in_order() {
        let backend = backend();
        backend.inject_fault(Operation::ResourceExists, BackendError::transient("throttled"));

        assert!(backend.resource_exists("/x").is_err());
        assert!(!backend.resource_exists("/x").unwrap());
        assert_eq!(backend.call_count(Operation::ResourceExists), 2);
    }

    #[test]
    fn test_read_lag_hides_new_assignments() {
        let backend = backend().with_read_lag(2);
        let alice = Identity::user("u-1", "alice@contoso.com");
        backend.create_assignment(&alice, "rd-reader", "/svc").unwrap();

        assert!(backend.list_assignments_for_principal("u-1", false).unwrap().is_empty());
        assert!(backend.list_assignments_for_principal("u-1", false).unwrap().is_empty());
        assert_eq!(backend.list_assignments_for_principal("u-1", false).unwrap().len(), 1);
    }

    #[test]
    fn test_inherited_assignments_include_groups() {
        let backend = backend().with_assignment("ra-g", "rd-reader", "g-1", "/svc");
        assert!(backend.list_assignments_for_principal("u-1", false).unwrap().is_empty());
        assert_eq!(backend.list_assignments_for_principal("u-1", true).unwrap().len(), 1);
    }

    #[test]
    fn test_role_definition_with_assignments_cannot_be_deleted() {
        let backend = backend()
            .with_custom_role("rd-c", {
                let mut def = RoleDefinition::new("custom");
                def.assignable_scopes.push("/svc".into());
                def
            })
            .with_assignment("ra-1", "rd-c", "u-1", "/svc");

        assert!(matches!(
            backend.delete_role_definition("rd-c"),
            Err(BackendError::HasAssignments(_))
        ));
        backend.delete_assignment("ra-1").unwrap();
        backend.delete_role_definition("rd-c").unwrap();
        assert!(backend.delete_role_definition("rd-c").unwrap_err().is_not_found());
    }

    #[test]
    fn test_builtin_roles_cannot_be_deleted() {
        let backend = backend();
        assert!(backend.delete_role_definition("rd-reader").unwrap_err().is_validation());
    }

    #[test]
    fn test_create_lock_upserts_by_name() {
        let backend = backend();
        backend.create_lock("rg", "lockA", LockLevel::CanNotDelete, Some("x")).unwrap();
        backend.create_lock("rg", "lockA", LockLevel::ReadOnly, None).unwrap();

        let locks = backend.locks("rg");
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].level, Some(LockLevel::ReadOnly));
    }
}
