//! Shared-safe removal of assignments and custom role definitions

use crate::error::{ReconcileError, Result};
use crate::outcome::{OutcomeStatus, RunReport};
use crate::retry::{RetryOutcome, RetryPolicy, Sleeper, Step};
use apim_access_core::{BackendError, Identity, RoleAssignment, RoleClient, RoleDefinitionRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Teardown configuration
#[derive(Debug, Clone)]
pub struct TeardownSettings {
    /// Wait for assignment deletions to propagate before deleting a definition
    pub settle: Duration,
    /// Bound and wait for definition deletion
    pub delete_policy: RetryPolicy,
}

impl Default for TeardownSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(30),
            delete_policy: RetryPolicy::fixed(6, Duration::from_secs(30)),
        }
    }
}

/// Removes a principal's bindings and, when unshared, the role itself
pub struct TeardownReconciler {
    client: Arc<dyn RoleClient>,
    sleeper: Arc<dyn Sleeper>,
    settings: TeardownSettings,
}

impl TeardownReconciler {
    pub fn new(client: Arc<dyn RoleClient>, sleeper: Arc<dyn Sleeper>, settings: TeardownSettings) -> Self {
        Self {
            client,
            sleeper,
            settings,
        }
    }

    /// Process every requested role in order.
    ///
    /// Fatal: an authorization failure anywhere, or exhausted retries while
    /// deleting a definition. Everything else is recorded per role.
    pub fn teardown(&self, identity: &Identity, role_names: &[String]) -> Result<RunReport> {
        let mut report = RunReport::new();
        let mut seen = HashSet::new();

        for name in role_names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            if !seen.insert(name.to_string()) {
                continue;
            }
            self.teardown_role(identity, name, &mut report)?;
        }

        let summary = report.summary();
        info!(principal = %identity.id, %summary, "teardown finished");
        Ok(report)
    }

    fn teardown_role(&self, identity: &Identity, name: &str, report: &mut RunReport) -> Result<()> {
        let record = match self.find_role(name)? {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(role = name, "role does not exist, nothing to do");
                report.skipped(name, "role not found");
                return Ok(());
            }
            Err(err) => {
                warn!(role = name, error = %err, "role lookup failed, role left in place");
                report.warn(name, format!("lookup failed: {}", err));
                return Ok(());
            }
        };

        self.delete_assignments(identity, &record, report)?;

        if !record.is_custom() {
            info!(role = name, "built-in role kept");
            report.skipped(name, "built-in role definitions are never deleted");
            return Ok(());
        }

        if let Some(reason) = self.shared_reason(identity, &record)? {
            warn!(role = name, reason = %reason, "role definition kept");
            report.skipped(name, reason);
            return Ok(());
        }

        debug!(role = name, settle_secs = self.settings.settle.as_secs(), "waiting for assignment deletions to settle");
        self.sleeper.sleep(self.settings.settle);
        self.delete_definition(&record)?;
        info!(role = name, id = %record.id, "role definition deleted");
        report.record(name, OutcomeStatus::Deleted);
        Ok(())
    }

    /// Look the role up, retrying transient failures under the deletion
    /// policy. The inner error is a lookup that never succeeded.
    fn find_role(&self, name: &str) -> Result<std::result::Result<Option<RoleDefinitionRecord>, BackendError>> {
        let outcome = self.settings.delete_policy.run(self.sleeper.as_ref(), |attempt| {
            match self.client.find_role_definition(name, None) {
                Ok(found) => Ok(Step::Done(Ok(found))),
                Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
                Err(err) if err.is_retryable() => {
                    debug!(role = name, attempt, error = %err, "role lookup failed");
                    Ok(Step::Retry(err))
                }
                Err(err) => Ok(Step::Done(Err(err))),
            }
        })?;

        Ok(match outcome {
            RetryOutcome::Completed(found) => found,
            RetryOutcome::Exhausted { last_error, .. } => Err(last_error),
        })
    }

    /// Delete every binding of `identity` to the role, by id first and by
    /// `(principal, role, scope)` when that fails
    fn delete_assignments(&self, identity: &Identity, record: &RoleDefinitionRecord, report: &mut RunReport) -> Result<()> {
        let assignments: Vec<RoleAssignment> = match self.client.list_assignments_for_principal(&identity.id, false) {
            Ok(all) => all
                .into_iter()
                .filter(|a| a.role_definition_id.eq_ignore_ascii_case(&record.id))
                .collect(),
            Err(BackendError::AuthorizationDenied(msg)) => return Err(ReconcileError::Authorization(msg)),
            Err(err) => {
                warn!(role = %record.name(), error = %err, "could not list assignments");
                report.warn(record.name(), format!("could not list assignments: {}", err));
                return Ok(());
            }
        };

        for assignment in assignments {
            let unit = format!("{} @ {}", record.name(), assignment.scope);
            let first = match self.client.delete_assignment(&assignment.id) {
                Ok(()) => Ok(()),
                Err(err) if err.is_not_found() => Ok(()),
                Err(BackendError::AuthorizationDenied(msg)) => return Err(ReconcileError::Authorization(msg)),
                Err(err) => Err(err),
            };
            let result = first.or_else(|err| {
                debug!(assignment = %assignment.id, error = %err, "delete by id failed, deleting by binding");
                match self
                    .client
                    .delete_assignment_by_binding(&identity.id, record.name(), &assignment.scope)
                {
                    Err(err) if err.is_not_found() => Ok(()),
                    other => other,
                }
            });

            match result {
                Ok(()) => {
                    info!(role = %record.name(), scope = %assignment.scope, "assignment deleted");
                    report.record(unit, OutcomeStatus::Deleted);
                }
                Err(BackendError::AuthorizationDenied(msg)) => return Err(ReconcileError::Authorization(msg)),
                Err(err) => {
                    warn!(role = %record.name(), scope = %assignment.scope, error = %err, "could not delete assignment");
                    report.warn(unit, format!("could not delete: {}", err));
                }
            }
        }
        Ok(())
    }

    /// Why the definition must stay, if it must
    fn shared_reason(&self, identity: &Identity, record: &RoleDefinitionRecord) -> Result<Option<String>> {
        match self.client.list_assignments_for_role(&record.id) {
            Ok(assignments) => {
                let others: HashSet<&str> = assignments
                    .iter()
                    .map(|a| a.principal_id.as_str())
                    .filter(|p| *p != identity.id)
                    .collect();
                Ok((!others.is_empty()).then(|| format!("still assigned to {} other principal(s)", others.len())))
            }
            Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
            Err(err) => Ok(Some(format!("could not confirm the role is unshared: {}", err))),
        }
    }

    fn delete_definition(&self, record: &RoleDefinitionRecord) -> Result<()> {
        let outcome = self.settings.delete_policy.run(self.sleeper.as_ref(), |attempt| {
            match self.client.delete_role_definition(&record.id) {
                Ok(()) => Ok(Step::Done(())),
                Err(err) if err.is_not_found() => Ok(Step::Done(())),
                Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
                Err(err) => {
                    debug!(role = %record.name(), attempt, error = %err, "definition delete failed");
                    Ok(Step::Retry(err))
                }
            }
        })?;

        match outcome {
            RetryOutcome::Completed(()) => Ok(()),
            RetryOutcome::Exhausted { attempts, last_error } => Err(ReconcileError::RetriesExhausted {
                unit: format!("role definition {}", record.name()),
                attempts,
                last_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use apim_access_core::{InMemoryBackend, Operation, RoleDefinition};

    const SCOPE_A: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ApiManagement/service/svc/apis/a";
    const SCOPE_B: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ApiManagement/service/svc/apis/b";

    fn custom(name: &str) -> RoleDefinition {
        let mut def = RoleDefinition::new(name);
        def.assignable_scopes = vec![SCOPE_A.into(), SCOPE_B.into()];
        def
    }

    fn alice() -> Identity {
        Identity::user("u-1", "alice@contoso.com")
    }

    fn setup(backend: InMemoryBackend) -> (TeardownReconciler, Arc<InMemoryBackend>, Arc<RecordingSleeper>) {
        let backend = Arc::new(backend);
        let sleeper = Arc::new(RecordingSleeper::new());
        let settings = TeardownSettings {
            settle: Duration::from_secs(30),
            delete_policy: RetryPolicy::fixed(3, Duration::from_secs(30)),
        };
        (
            TeardownReconciler::new(backend.clone(), sleeper.clone(), settings),
            backend,
            sleeper,
        )
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_deletes_assignments_then_unshared_definition() {
        let (reconciler, backend, sleeper) = setup(
            InMemoryBackend::new()
                .with_custom_role("rd-1", custom("APIM-User-alice"))
                .with_assignment("ra-1", "rd-1", "u-1", SCOPE_A)
                .with_assignment("ra-2", "rd-1", "u-1", SCOPE_B),
        );

        let report = reconciler.teardown(&alice(), &roles(&["APIM-User-alice"])).unwrap();

        assert_eq!(report.status_of("APIM-User-alice"), Some(&OutcomeStatus::Deleted));
        assert!(backend.assignments().is_empty());
        assert!(backend.role_definitions().is_empty());
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn test_missing_role_is_a_no_op() {
        let (reconciler, backend, _) = setup(InMemoryBackend::new());
        let report = reconciler.teardown(&alice(), &roles(&["APIM-gone"])).unwrap();

        assert!(matches!(report.status_of("APIM-gone"), Some(OutcomeStatus::Skipped(_))));
        assert!(!report.has_failures());
        assert_eq!(backend.call_count(Operation::DeleteRoleDefinition), 0);
    }

    #[test]
    fn test_transient_lookup_is_retried() {
        let (reconciler, backend, sleeper) = setup(
            InMemoryBackend::new()
                .with_custom_role("rd-1", custom("APIM-User-alice"))
                .with_assignment("ra-1", "rd-1", "u-1", SCOPE_A),
        );
        backend.inject_fault(Operation::FindRoleDefinition, BackendError::transient("503"));

        let report = reconciler.teardown(&alice(), &roles(&["APIM-User-alice"])).unwrap();

        assert_eq!(report.status_of("APIM-User-alice"), Some(&OutcomeStatus::Deleted));
        assert_eq!(backend.call_count(Operation::FindRoleDefinition), 2);
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(30), Duration::from_secs(30)]);
    }

    #[test]
    fn test_failed_lookup_is_a_warning() {
        let (reconciler, backend, _) = setup(InMemoryBackend::new().with_custom_role("rd-1", custom("APIM-User-alice")));
        backend.inject_faults(Operation::FindRoleDefinition, BackendError::transient("503"), 3);

        let report = reconciler.teardown(&alice(), &roles(&["APIM-User-alice"])).unwrap();

        assert!(matches!(report.status_of("APIM-User-alice"), Some(OutcomeStatus::Warning(_))));
        assert!(!report.has_failures());
        assert_eq!(backend.call_count(Operation::FindRoleDefinition), 3);
        assert_eq!(backend.role_definitions().len(), 1);
    }

    #[test]
    fn test_shared_role_is_kept() {
        let (reconciler, backend, _) = setup(
            InMemoryBackend::new()
                .with_custom_role("rd-1", custom("APIM-shared"))
                .with_assignment("ra-1", "rd-1", "u-1", SCOPE_A)
                .with_assignment("ra-2", "rd-1", "u-2", SCOPE_A),
        );

        let report = reconciler.teardown(&alice(), &roles(&["APIM-shared"])).unwrap();

        assert!(matches!(report.status_of("APIM-shared"), Some(OutcomeStatus::Skipped(_))));
        assert_eq!(backend.call_count(Operation::DeleteRoleDefinition), 0);
        assert_eq!(backend.role_definitions().len(), 1);
        let left = backend.assignments();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].principal_id, "u-2");
    }

    #[test]
    fn test_builtin_role_definition_never_deleted() {
        let (reconciler, backend, sleeper) = setup(
            InMemoryBackend::new()
                .with_builtin_role("rd-reader", "API Management Service Reader Role")
                .with_assignment("ra-1", "rd-reader", "u-1", SCOPE_A),
        );

        let report = reconciler
            .teardown(&alice(), &roles(&["API Management Service Reader Role"]))
            .unwrap();

        assert!(backend.assignments().is_empty());
        assert_eq!(backend.call_count(Operation::DeleteRoleDefinition), 0);
        assert_eq!(backend.call_count(Operation::ListAssignments), 1);
        assert!(sleeper.durations().is_empty());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_falls_back_to_delete_by_binding() {
        let (reconciler, backend, _) = setup(
            InMemoryBackend::new()
                .with_custom_role("rd-1", custom("APIM-User-alice"))
                .with_assignment("ra-1", "rd-1", "u-1", SCOPE_A),
        );
        backend.inject_fault(Operation::DeleteAssignment, BackendError::transient("500"));

        let report = reconciler.teardown(&alice(), &roles(&["APIM-User-alice"])).unwrap();

        assert_eq!(backend.call_count(Operation::DeleteAssignmentByBinding), 1);
        assert_eq!(
            report.status_of(&format!("APIM-User-alice @ {}", SCOPE_A)),
            Some(&OutcomeStatus::Deleted)
        );
        assert_eq!(report.status_of("APIM-User-alice"), Some(&OutcomeStatus::Deleted));
    }

    #[test]
    fn test_leftover_assignment_exhausts_definition_delete() {
        let (reconciler, backend, _) = setup(
            InMemoryBackend::new()
                .with_custom_role("rd-1", custom("APIM-one"))
                .with_custom_role("rd-2", custom("APIM-two"))
                .with_assignment("ra-1", "rd-1", "u-1", SCOPE_A)
                .with_assignment("ra-2", "rd-2", "u-1", SCOPE_A),
        );
        backend.inject_fault(Operation::DeleteAssignment, BackendError::transient("500"));
        backend.inject_fault(Operation::DeleteAssignmentByBinding, BackendError::transient("500"));
        // ra-1 stays, so rd-1 keeps reporting assignments until retries run out

        let err = reconciler
            .teardown(&alice(), &roles(&["APIM-one", "APIM-two"]))
            .unwrap_err();

        assert!(matches!(err, ReconcileError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(backend.call_count(Operation::DeleteRoleDefinition), 3);
    }

    #[test]
    fn test_has_assignments_is_retried_after_the_same_wait() {
        let (reconciler, backend, sleeper) = setup(
            InMemoryBackend::new().with_custom_role("rd-1", custom("APIM-User-alice")),
        );
        backend.inject_faults(Operation::DeleteRoleDefinition, BackendError::HasAssignments("rd-1".into()), 2);

        let report = reconciler.teardown(&alice(), &roles(&["APIM-User-alice"])).unwrap();

        assert_eq!(report.status_of("APIM-User-alice"), Some(&OutcomeStatus::Deleted));
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(30); 3]);
    }

    #[test]
    fn test_authorization_failure_aborts_run() {
        let (reconciler, backend, _) = setup(
            InMemoryBackend::new()
                .with_custom_role("rd-1", custom("APIM-one"))
                .with_custom_role("rd-2", custom("APIM-two")),
        );
        backend.inject_fault(Operation::DeleteRoleDefinition, BackendError::denied("roleDefinitions/delete"));

        let err = reconciler
            .teardown(&alice(), &roles(&["APIM-one", "APIM-two"]))
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Authorization(_)));
        assert_eq!(backend.role_definitions().len(), 2);
        assert_eq!(backend.call_count(Operation::DeleteRoleDefinition), 1);
    }

    #[test]
    fn test_unverifiable_sharing_keeps_definition() {
        let (reconciler, backend, _) = setup(
            InMemoryBackend::new().with_custom_role("rd-1", custom("APIM-User-alice")),
        );
        // First listing is for the principal, second for the role
        backend.inject_fault(Operation::ListAssignments, BackendError::not_found("x"));
        backend.inject_fault(Operation::ListAssignments, BackendError::transient("503"));

        let report = reconciler.teardown(&alice(), &roles(&["APIM-User-alice"])).unwrap();

        assert!(matches!(report.status_of("APIM-User-alice"), Some(OutcomeStatus::Skipped(_))));
        assert_eq!(backend.role_definitions().len(), 1);
    }
}
