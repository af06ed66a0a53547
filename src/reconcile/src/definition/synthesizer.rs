//! Role definition synthesis and application

use super::naming::RoleNamer;
use super::permissions::{check_boundary, PermissionSet};
use crate::error::{ReconcileError, Result};
use crate::outcome::{OutcomeStatus, RunReport};
use crate::retry::{RetryOutcome, RetryPolicy, Sleeper, Step};
use crate::scope::{is_within, TargetScopes};
use apim_access_core::{
    BackendError, Granularity, Identity, RoleAssignment, RoleClient, RoleDefinition,
    RoleDefinitionRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Markers of roles that already grant more than a synthesized role
pub const DEFAULT_CONFLICT_MARKERS: &[&str] = &["Administrator", "Owner", "Contributor"];

/// Synthesizer configuration
#[derive(Debug, Clone)]
pub struct SynthesizerSettings {
    pub namer: RoleNamer,
    pub conflict_markers: Vec<String>,
    /// Bound and backoff for definition lookup and create/update
    pub apply_policy: RetryPolicy,
}

impl Default for SynthesizerSettings {
    fn default() -> Self {
        Self {
            namer: RoleNamer::default(),
            conflict_markers: DEFAULT_CONFLICT_MARKERS.iter().map(|m| m.to_string()).collect(),
            apply_policy: RetryPolicy::default(),
        }
    }
}

/// What the backend needs to be told about the definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionIntent {
    Create(RoleDefinition),
    Update { id: String, definition: RoleDefinition },
}

impl DefinitionIntent {
    pub fn definition(&self) -> &RoleDefinition {
        match self {
            DefinitionIntent::Create(definition) => definition,
            DefinitionIntent::Update { definition, .. } => definition,
        }
    }
}

/// A high-privilege role the principal already holds outside the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictWarning {
    pub role_name: String,
    pub scope: String,
    /// Holder of the assignment, a group when inherited
    pub principal_id: String,
}

impl ConflictWarning {
    pub fn message(&self) -> String {
        format!(
            "principal {} already holds '{}' at {}",
            self.principal_id, self.role_name, self.scope
        )
    }
}

/// Result of synthesizing a definition for one principal and resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub role_name: String,
    pub granularity: Granularity,
    pub intent: DefinitionIntent,
    pub conflicts: Vec<ConflictWarning>,
}

impl Synthesis {
    /// Record every conflict as a warning
    pub fn report_conflicts(&self, report: &mut RunReport) {
        for conflict in &self.conflicts {
            report.warn(format!("conflict {}", conflict.role_name), conflict.message());
        }
    }
}

/// Definition as stored after apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionOutcome {
    Created(RoleDefinitionRecord),
    Updated(RoleDefinitionRecord),
}

impl DefinitionOutcome {
    pub fn record(&self) -> &RoleDefinitionRecord {
        match self {
            DefinitionOutcome::Created(record) | DefinitionOutcome::Updated(record) => record,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            DefinitionOutcome::Created(_) => OutcomeStatus::Created,
            DefinitionOutcome::Updated(_) => OutcomeStatus::Updated,
        }
    }
}

/// Builds and applies least-privilege role definitions
pub struct RoleDefinitionSynthesizer {
    client: Arc<dyn RoleClient>,
    sleeper: Arc<dyn Sleeper>,
    settings: SynthesizerSettings,
}

impl RoleDefinitionSynthesizer {
    pub fn new(client: Arc<dyn RoleClient>, sleeper: Arc<dyn Sleeper>, settings: SynthesizerSettings) -> Self {
        Self {
            client,
            sleeper,
            settings,
        }
    }

    pub fn role_name(&self, identity: &Identity, targets: &TargetScopes) -> String {
        self.settings
            .namer
            .derive(identity.kind, &identity.display_name, &targets.resource_name)
    }

    /// Compute the create or update intent for `identity` over `targets`.
    ///
    /// Nothing is written. Conflict detection only runs when the role
    /// already exists and never fails the synthesis.
    pub fn synthesize(&self, identity: &Identity, targets: &TargetScopes) -> Result<Synthesis> {
        let role_name = self.role_name(identity, targets);
        let mut definition = RoleDefinition::new(role_name.clone());
        definition.description = format!(
            "Least-privilege {} access for {} {} on {}",
            targets.granularity,
            identity.kind,
            identity.display_name,
            targets.resource_name
        );
        PermissionSet::for_granularity(targets.granularity).apply_to(&mut definition);
        definition.assignable_scopes = targets.paths();

        let (intent, conflicts) = match self.lookup(&role_name)? {
            None => {
                info!(role = %role_name, "role definition not found, will create");
                (DefinitionIntent::Create(definition), Vec::new())
            }
            Some(existing) if !existing.is_custom() => {
                return Err(ReconcileError::Backend(BackendError::validation(format!(
                    "'{}' names a built-in role",
                    role_name
                ))));
            }
            Some(existing) => {
                info!(role = %role_name, id = %existing.id, "role definition exists, will update");
                definition.assignable_scopes =
                    merge_scopes(&definition.assignable_scopes, &existing.definition.assignable_scopes);
                let conflicts = self.detect_conflicts(identity, targets);
                (
                    DefinitionIntent::Update {
                        id: existing.id,
                        definition,
                    },
                    conflicts,
                )
            }
        };

        validate(intent.definition(), targets.granularity)?;
        Ok(Synthesis {
            role_name,
            granularity: targets.granularity,
            intent,
            conflicts,
        })
    }

    /// Write the synthesized intent, retrying transient failures.
    ///
    /// A create that hits an existing definition switches to update, an
    /// update whose target vanished switches to create. This is the only
    /// unit of work of a provisioning run, so exhaustion is fatal.
    pub fn apply(&self, synthesis: &Synthesis) -> Result<DefinitionOutcome> {
        validate(synthesis.intent.definition(), synthesis.granularity)?;
        let mut intent = synthesis.intent.clone();

        let outcome = self.settings.apply_policy.run(self.sleeper.as_ref(), |attempt| {
            debug!(role = %synthesis.role_name, attempt, "applying role definition");
            match &intent {
                DefinitionIntent::Create(definition) => match self.client.create_role_definition(definition) {
                    Ok(record) => Ok(Step::Done(DefinitionOutcome::Created(record))),
                    Err(BackendError::Conflict(msg)) => {
                        debug!(role = %definition.name, reason = %msg, "definition appeared concurrently");
                        if let Some(existing) = self.lookup_once(&definition.name)? {
                            let mut merged = definition.clone();
                            merged.assignable_scopes =
                                merge_scopes(&definition.assignable_scopes, &existing.definition.assignable_scopes);
                            intent = DefinitionIntent::Update {
                                id: existing.id,
                                definition: merged,
                            };
                        }
                        Ok(Step::Retry(BackendError::Conflict(msg)))
                    }
                    Err(err) => classify(err),
                },
                DefinitionIntent::Update { id, definition } => {
                    match self.client.update_role_definition(id, definition) {
                        Ok(record) => Ok(Step::Done(DefinitionOutcome::Updated(record))),
                        Err(BackendError::NotFound(msg)) => {
                            intent = DefinitionIntent::Create(definition.clone());
                            Ok(Step::Retry(BackendError::NotFound(msg)))
                        }
                        Err(err) => classify(err),
                    }
                }
            }
        })?;

        match outcome {
            RetryOutcome::Completed(outcome) => {
                info!(role = %synthesis.role_name, id = %outcome.record().id, status = ?outcome.status(), "role definition applied");
                Ok(outcome)
            }
            RetryOutcome::Exhausted { attempts, last_error } => Err(ReconcileError::RetriesExhausted {
                unit: format!("role definition {}", synthesis.role_name),
                attempts,
                last_error,
            }),
        }
    }

    fn lookup(&self, role_name: &str) -> Result<Option<RoleDefinitionRecord>> {
        let outcome = self.settings.apply_policy.run(self.sleeper.as_ref(), |_| {
            match self.client.find_role_definition(role_name, None) {
                Ok(found) => Ok(Step::Done(found)),
                Err(err) => classify(err),
            }
        })?;
        match outcome {
            RetryOutcome::Completed(found) => Ok(found),
            RetryOutcome::Exhausted { attempts, last_error } => Err(ReconcileError::RetriesExhausted {
                unit: format!("role definition lookup {}", role_name),
                attempts,
                last_error,
            }),
        }
    }

    fn lookup_once(&self, role_name: &str) -> Result<Option<RoleDefinitionRecord>> {
        match self.client.find_role_definition(role_name, None) {
            Ok(found) => Ok(found),
            Err(err) if err.is_authorization() => Err(err.into()),
            Err(err) => {
                debug!(role = role_name, error = %err, "lookup after conflict failed");
                Ok(None)
            }
        }
    }

    /// High-privilege roles the principal holds, directly or through a
    /// group, at scopes outside the target service
    fn detect_conflicts(&self, identity: &Identity, targets: &TargetScopes) -> Vec<ConflictWarning> {
        let assignments = match self.client.list_assignments_for_principal(&identity.id, true) {
            Ok(assignments) => assignments,
            Err(err) => {
                warn!(principal = %identity.id, error = %err, "could not list assignments for conflict detection");
                return Vec::new();
            }
        };

        let service_scope = targets.service.scope();
        let mut names: HashMap<String, Option<String>> = HashMap::new();
        let mut conflicts = Vec::new();

        for assignment in assignments
            .iter()
            .filter(|a| !is_within(&a.scope, service_scope.as_str()))
        {
            let Some(role_name) = self.role_name_of(assignment, &mut names) else {
                continue;
            };
            if self.is_high_privilege(&role_name) {
                let conflict = ConflictWarning {
                    role_name,
                    scope: assignment.scope.clone(),
                    principal_id: assignment.principal_id.clone(),
                };
                warn!(principal = %identity.id, conflict = %conflict.message(), "co-existing high-privilege role");
                conflicts.push(conflict);
            }
        }
        conflicts
    }

    fn role_name_of(&self, assignment: &RoleAssignment, cache: &mut HashMap<String, Option<String>>) -> Option<String> {
        cache
            .entry(assignment.role_definition_id.clone())
            .or_insert_with(|| match self.client.get_role_definition(&assignment.role_definition_id) {
                Ok(record) => record.map(|r| r.definition.name),
                Err(err) => {
                    warn!(role_definition = %assignment.role_definition_id, error = %err, "could not resolve role name");
                    None
                }
            })
            .clone()
    }

    fn is_high_privilege(&self, role_name: &str) -> bool {
        let lower = role_name.to_ascii_lowercase();
        self.settings
            .conflict_markers
            .iter()
            .any(|marker| lower.contains(&marker.to_ascii_lowercase()))
    }
}

/// New scopes first, then previously assignable scopes not in the new set
pub fn merge_scopes(new: &[String], existing: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = new.to_vec();
    for scope in existing {
        if !merged.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            merged.push(scope.clone());
        }
    }
    merged
}

fn validate(definition: &RoleDefinition, granularity: Granularity) -> Result<()> {
    if definition.assignable_scopes.is_empty() {
        return Err(ReconcileError::ScopeValidation(format!(
            "role '{}' has no assignable scopes",
            definition.name
        )));
    }
    check_boundary(definition, granularity)
}

fn classify<T>(err: BackendError) -> Result<Step<T>> {
    if err.is_authorization() || err.is_validation() {
        Err(err.into())
    } else {
        Ok(Step::Retry(err))
    }
}
