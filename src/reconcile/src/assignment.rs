//! Idempotent role assignment with create and verification backoff
//!
//! For every target scope the reconciler makes sure exactly one binding of
//! the principal to the synthesized role exists, then binds the reader role
//! once at the service scope and finally polls until each newly created
//! binding is visible to reads.

use crate::error::{ReconcileError, Result};
use crate::outcome::{OutcomeStatus, RunReport};
use crate::retry::{RetryOutcome, RetryPolicy, Sleeper, Step};
use crate::scope::{ResourceScope, TargetScopes};
use apim_access_core::{BackendError, Identity, RoleAssignment, RoleClient, RoleDefinitionRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Built-in role that lets a principal enumerate the service
pub const DEFAULT_READER_ROLE: &str = "API Management Service Reader Role";

/// Assignment reconciler configuration
#[derive(Debug, Clone)]
pub struct AssignmentSettings {
    /// Attempt bound and base wait for each create
    pub create_policy: RetryPolicy,
    /// Poll bound and base wait for read-back verification
    pub verify_policy: RetryPolicy,
    pub reader_role_name: String,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        Self {
            create_policy: RetryPolicy::new(5, Duration::from_secs(10)),
            verify_policy: RetryPolicy::new(6, Duration::from_secs(10)),
            reader_role_name: DEFAULT_READER_ROLE.to_string(),
        }
    }
}

/// Result of establishing one binding
#[derive(Debug)]
enum Binding {
    Created(RoleAssignment),
    AlreadyPresent,
    Failed(String),
}

/// A binding that still has to show up in reads
#[derive(Debug)]
struct PendingVerification {
    unit: String,
    assignment: RoleAssignment,
}

/// Creates and verifies role bindings for one principal
pub struct AssignmentReconciler {
    client: Arc<dyn RoleClient>,
    sleeper: Arc<dyn Sleeper>,
    settings: AssignmentSettings,
}

impl AssignmentReconciler {
    pub fn new(client: Arc<dyn RoleClient>, sleeper: Arc<dyn Sleeper>, settings: AssignmentSettings) -> Self {
        Self {
            client,
            sleeper,
            settings,
        }
    }

    /// Bind `identity` to `role` at every target scope, plus the reader role.
    ///
    /// Per-scope failures are recorded and the remaining scopes are still
    /// processed. Only an authorization failure aborts the run.
    pub fn reconcile(
        &self,
        identity: &Identity,
        role: &RoleDefinitionRecord,
        targets: &TargetScopes,
    ) -> Result<RunReport> {
        let mut report = RunReport::new();
        let existing = self.existing_assignments(identity)?;
        let mut pending = Vec::new();

        for scope in &targets.scopes {
            let unit = scope.as_str().to_string();
            self.establish(identity, role, scope, &existing, &unit, &mut report, &mut pending)?;
        }

        self.assign_reader(identity, &targets.service.scope(), &existing, &mut report, &mut pending)?;

        for item in pending {
            self.verify(identity, item, &mut report)?;
        }

        let summary = report.summary();
        info!(principal = %identity.id, role = %role.name(), %summary, "assignment reconciliation finished");
        Ok(report)
    }

    fn existing_assignments(&self, identity: &Identity) -> Result<Vec<RoleAssignment>> {
        match self.client.list_assignments_for_principal(&identity.id, false) {
            Ok(assignments) => Ok(assignments),
            Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
            Err(err) => {
                warn!(principal = %identity.id, error = %err, "could not list current assignments, assuming none");
                Ok(Vec::new())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn establish(
        &self,
        identity: &Identity,
        role: &RoleDefinitionRecord,
        scope: &ResourceScope,
        existing: &[RoleAssignment],
        unit: &str,
        report: &mut RunReport,
        pending: &mut Vec<PendingVerification>,
    ) -> Result<()> {
        if existing.iter().any(|a| binds(a, &role.id, scope.as_str())) {
            debug!(scope = %scope, role = %role.name(), "assignment already present");
            report.record(unit, OutcomeStatus::AlreadyPresent);
            return Ok(());
        }

        match self.create_with_retry(identity, &role.id, scope.as_str())? {
            Binding::Created(assignment) => {
                info!(scope = %scope, role = %role.name(), id = %assignment.id, "assignment created");
                report.record(unit, OutcomeStatus::Created);
                pending.push(PendingVerification {
                    unit: unit.to_string(),
                    assignment,
                });
            }
            Binding::AlreadyPresent => {
                info!(scope = %scope, role = %role.name(), "assignment already existed");
                report.record(unit, OutcomeStatus::AlreadyPresent);
            }
            Binding::Failed(reason) => {
                warn!(scope = %scope, role = %role.name(), reason = %reason, "assignment failed");
                report.fail(unit, reason);
            }
        }
        Ok(())
    }

    fn assign_reader(
        &self,
        identity: &Identity,
        service: &ResourceScope,
        existing: &[RoleAssignment],
        report: &mut RunReport,
        pending: &mut Vec<PendingVerification>,
    ) -> Result<()> {
        let unit = format!("reader {}", service);
        let reader = match self
            .client
            .find_role_definition(&self.settings.reader_role_name, Some(service.as_str()))
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                report.fail(unit, format!("role '{}' not found", self.settings.reader_role_name));
                return Ok(());
            }
            Err(BackendError::AuthorizationDenied(msg)) => return Err(ReconcileError::Authorization(msg)),
            Err(err) => {
                report.fail(unit, format!("could not look up '{}': {}", self.settings.reader_role_name, err));
                return Ok(());
            }
        };

        self.establish(identity, &reader, service, existing, &unit, report, pending)
    }

    fn create_with_retry(&self, identity: &Identity, role_id: &str, scope: &str) -> Result<Binding> {
        let outcome = self.settings.create_policy.run(self.sleeper.as_ref(), |attempt| {
            match self.client.create_assignment(identity, role_id, scope) {
                Ok(assignment) => Ok(Step::Done(Binding::Created(assignment))),
                Err(BackendError::Conflict(_)) => Ok(Step::Done(Binding::AlreadyPresent)),
                Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
                Err(BackendError::Validation(msg)) => Ok(Step::Done(Binding::Failed(format!("rejected: {}", msg)))),
                Err(err) => {
                    debug!(scope, attempt, error = %err, "assignment create failed");
                    Ok(Step::Retry(err))
                }
            }
        })?;

        Ok(match outcome {
            RetryOutcome::Completed(binding) => binding,
            RetryOutcome::Exhausted { attempts, last_error } => {
                Binding::Failed(format!("retries exhausted after {} attempts: {}", attempts, last_error))
            }
        })
    }

    /// Poll until the binding is readable; never retracts it
    fn verify(&self, identity: &Identity, item: PendingVerification, report: &mut RunReport) -> Result<()> {
        let assignment = &item.assignment;
        let outcome = self.settings.verify_policy.run(self.sleeper.as_ref(), |poll| {
            match self.client.list_assignments_for_principal(&identity.id, false) {
                Ok(current) if current.iter().any(|a| a.id == assignment.id || binds(a, &assignment.role_definition_id, &assignment.scope)) => {
                    Ok(Step::Done(poll))
                }
                Ok(_) => Ok(Step::Retry(BackendError::not_found(format!(
                    "assignment {} not visible yet",
                    assignment.id
                )))),
                Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
                Err(err) => Ok(Step::Retry(err)),
            }
        })?;

        let unit = format!("verify {}", item.unit);
        match outcome {
            RetryOutcome::Completed(polls) => {
                debug!(scope = %assignment.scope, polls, "assignment verified");
                report.record(unit, OutcomeStatus::Verified);
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                warn!(scope = %assignment.scope, polls = attempts, error = %last_error, "assignment not visible after verification");
                report.warn(unit, format!("not visible after {} polls", attempts));
            }
        }
        Ok(())
    }
}

fn binds(assignment: &RoleAssignment, role_definition_id: &str, scope: &str) -> bool {
    assignment.role_definition_id.eq_ignore_ascii_case(role_definition_id)
        && assignment.scope.trim_end_matches('/').eq_ignore_ascii_case(scope.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use crate::scope::ServiceRef;
    use apim_access_core::{Granularity, InMemoryBackend, Operation, RoleDefinition};

    const ROLE_ID: &str = "rd-apim";
    const READER_ID: &str = "rd-reader";

    fn service() -> ServiceRef {
        ServiceRef::new("sub-1", "rg-apis", "contoso").unwrap()
    }

    fn targets(apis: &[&str]) -> TargetScopes {
        let service = service();
        TargetScopes {
            granularity: Granularity::Api,
            resource_name: service.service_name.clone(),
            scopes: apis.iter().map(|a| service.api_scope(a).unwrap()).collect(),
            service,
            dropped: Vec::new(),
        }
    }

    fn role() -> RoleDefinitionRecord {
        let mut def = RoleDefinition::new("APIM-User-alice-contoso");
        def.assignable_scopes = targets(&["orders", "billing"]).paths();
        RoleDefinitionRecord {
            id: ROLE_ID.into(),
            role_type: apim_access_core::RoleType::Custom,
            definition: def,
        }
    }

    fn alice() -> Identity {
        Identity::user("u-1", "alice@contoso.com")
    }

    fn setup(backend: InMemoryBackend) -> (AssignmentReconciler, Arc<InMemoryBackend>, Arc<RecordingSleeper>) {
        let backend = Arc::new(
            backend
                .with_custom_role(ROLE_ID, role().definition)
                .with_builtin_role(READER_ID, DEFAULT_READER_ROLE),
        );
        let sleeper = Arc::new(RecordingSleeper::new());
        let settings = AssignmentSettings {
            create_policy: RetryPolicy::new(3, Duration::from_secs(10)),
            verify_policy: RetryPolicy::new(4, Duration::from_secs(5)),
            reader_role_name: DEFAULT_READER_ROLE.into(),
        };
        (
            AssignmentReconciler::new(backend.clone(), sleeper.clone(), settings),
            backend,
            sleeper,
        )
    }

    #[test]
    fn test_creates_each_scope_and_reader_once() {
        let (reconciler, backend, sleeper) = setup(InMemoryBackend::new());
        let targets = targets(&["orders", "billing"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        assert!(!report.has_failures());
        assert_eq!(backend.assignments().len(), 3);
        assert_eq!(backend.call_count(Operation::CreateAssignment), 3);
        for scope in targets.paths() {
            assert_eq!(report.status_of(&scope), Some(&OutcomeStatus::Created));
            assert_eq!(report.status_of(&format!("verify {}", scope)), Some(&OutcomeStatus::Verified));
        }
        let reader_unit = format!("reader {}", service().scope());
        assert_eq!(report.status_of(&reader_unit), Some(&OutcomeStatus::Created));
        assert!(sleeper.durations().is_empty());
    }

    #[test]
    fn test_second_run_creates_nothing() {
        let (reconciler, backend, _) = setup(InMemoryBackend::new());
        let targets = targets(&["orders"]);

        reconciler.reconcile(&alice(), &role(), &targets).unwrap();
        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        assert_eq!(backend.assignments().len(), 2);
        assert_eq!(report.status_of(&targets.paths()[0]), Some(&OutcomeStatus::AlreadyPresent));
    }

    #[test]
    fn test_create_conflict_counts_as_present() {
        let (reconciler, backend, _) = setup(InMemoryBackend::new());
        backend.inject_fault(
            Operation::CreateAssignment,
            BackendError::Conflict("RoleAssignmentExists".into()),
        );
        let targets = targets(&["orders"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();
        assert_eq!(report.status_of(&targets.paths()[0]), Some(&OutcomeStatus::AlreadyPresent));
        assert!(!report.has_failures());
    }

    #[test]
    fn test_create_retries_with_linear_backoff() {
        let (reconciler, backend, sleeper) = setup(InMemoryBackend::new());
        backend.inject_faults(Operation::CreateAssignment, BackendError::not_found("principal not replicated"), 2);
        let targets = targets(&["orders"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        assert_eq!(report.status_of(&targets.paths()[0]), Some(&OutcomeStatus::Created));
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(10), Duration::from_secs(20)]);
    }

    #[test]
    fn test_exhaustion_fails_one_scope_only() {
        let (reconciler, backend, _) = setup(InMemoryBackend::new());
        backend.inject_faults(Operation::CreateAssignment, BackendError::transient("503"), 3);
        let targets = targets(&["orders", "billing"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        let paths = targets.paths();
        assert!(matches!(report.status_of(&paths[0]), Some(OutcomeStatus::Failed(_))));
        assert_eq!(report.status_of(&paths[1]), Some(&OutcomeStatus::Created));
        assert!(report.has_failures());
        // 3 failed attempts, then one each for billing and the reader role
        assert_eq!(backend.call_count(Operation::CreateAssignment), 5);
    }

    #[test]
    fn test_validation_error_is_not_retried() {
        let (reconciler, backend, sleeper) = setup(InMemoryBackend::new());
        backend.inject_fault(Operation::CreateAssignment, BackendError::validation("bad scope"));
        let targets = targets(&["orders"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        assert!(matches!(report.status_of(&targets.paths()[0]), Some(OutcomeStatus::Failed(_))));
        assert!(sleeper.durations().is_empty());
    }

    #[test]
    fn test_authorization_aborts_immediately() {
        let (reconciler, backend, _) = setup(InMemoryBackend::new());
        backend.inject_fault(Operation::CreateAssignment, BackendError::denied("roleAssignments/write"));

        let err = reconciler
            .reconcile(&alice(), &role(), &targets(&["orders", "billing"]))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Authorization(_)));
        assert_eq!(backend.call_count(Operation::CreateAssignment), 1);
    }

    #[test]
    fn test_verification_absorbs_read_lag() {
        let (reconciler, _, sleeper) = setup(InMemoryBackend::new().with_read_lag(2));
        let targets = targets(&["orders"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        let verify = format!("verify {}", targets.paths()[0]);
        assert_eq!(report.status_of(&verify), Some(&OutcomeStatus::Verified));
        assert!(!sleeper.durations().is_empty());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_unverified_assignment_is_a_warning() {
        let (reconciler, backend, sleeper) = setup(InMemoryBackend::new().with_read_lag(100));
        let targets = targets(&["orders"]);

        let report = reconciler.reconcile(&alice(), &role(), &targets).unwrap();

        let verify = format!("verify {}", targets.paths()[0]);
        assert!(matches!(report.status_of(&verify), Some(OutcomeStatus::Warning(_))));
        assert!(!report.has_failures());
        // Never retracted
        assert_eq!(backend.assignments().len(), 2);
        assert_eq!(
            sleeper.durations()[..3].to_vec(),
            vec![Duration::from_secs(5), Duration::from_secs(10), Duration::from_secs(15)]
        );
    }

    #[test]
    fn test_missing_reader_role_fails_run() {
        let backend = Arc::new(
            InMemoryBackend::new().with_custom_role(ROLE_ID, role().definition),
        );
        let reconciler = AssignmentReconciler::new(
            backend.clone(),
            Arc::new(RecordingSleeper::new()),
            AssignmentSettings::default(),
        );

        let report = reconciler.reconcile(&alice(), &role(), &targets(&["orders"])).unwrap();
        let reader_unit = format!("reader {}", service().scope());
        assert!(matches!(report.status_of(&reader_unit), Some(OutcomeStatus::Failed(_))));
    }
}
