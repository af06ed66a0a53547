//! The pipelines behind each tool, wired against any Authorization API
//! client

use crate::config::AccessConfig;
use apim_access_core::{AuthorizationClient, LockSnapshot};
use apim_access_reconcile::{
    AssignmentReconciler, IdentityResolver, LockSnapshotManager, Result, RoleDefinitionSynthesizer,
    RunReport, ScopeBuilder, ServiceRef, Sleeper, TargetScopes, TeardownReconciler,
};
use std::sync::Arc;
use tracing::info;

/// Every reconciler, sharing one backend and one sleeper
pub struct Engine {
    resolver: IdentityResolver,
    scopes: ScopeBuilder,
    synthesizer: RoleDefinitionSynthesizer,
    assignments: AssignmentReconciler,
    teardown: TeardownReconciler,
    locks: LockSnapshotManager,
}

impl Engine {
    pub fn new<B>(backend: Arc<B>, sleeper: Arc<dyn Sleeper>, config: &AccessConfig) -> Self
    where
        B: AuthorizationClient + 'static,
    {
        Self {
            resolver: IdentityResolver::new(backend.clone()),
            scopes: ScopeBuilder::new(backend.clone()),
            synthesizer: RoleDefinitionSynthesizer::new(
                backend.clone(),
                sleeper.clone(),
                config.synthesizer_settings(),
            ),
            assignments: AssignmentReconciler::new(backend.clone(), sleeper.clone(), config.assignment_settings()),
            teardown: TeardownReconciler::new(backend.clone(), sleeper, config.teardown_settings()),
            locks: LockSnapshotManager::new(backend),
        }
    }

    /// Grant `identity` access to whole APIs of one service
    pub fn assign_apis(&self, service: &ServiceRef, identity: &str, apis: &[String]) -> Result<RunReport> {
        let mut report = RunReport::new();
        let resolution = self.resolver.resolve(identity)?;
        let targets = self.scopes.api_scopes(service, apis, &mut report)?;
        self.provision(&resolution.identity, &targets, report)
    }

    /// Grant `identity` access to individual operations of one API
    pub fn assign_operations(
        &self,
        service: &ServiceRef,
        identity: &str,
        api: &str,
        operations: &[String],
    ) -> Result<RunReport> {
        let mut report = RunReport::new();
        let resolution = self.resolver.resolve(identity)?;
        let targets = self.scopes.operation_scopes(service, api, operations, &mut report)?;
        self.provision(&resolution.identity, &targets, report)
    }

    fn provision(
        &self,
        identity: &apim_access_core::Identity,
        targets: &TargetScopes,
        mut report: RunReport,
    ) -> Result<RunReport> {
        let synthesis = self.synthesizer.synthesize(identity, targets)?;
        synthesis.report_conflicts(&mut report);

        let definition = self.synthesizer.apply(&synthesis)?;
        report.record(synthesis.role_name.clone(), definition.status());

        report.merge(self.assignments.reconcile(identity, definition.record(), targets)?);
        info!(role = %synthesis.role_name, summary = %report.summary(), "provisioning finished");
        Ok(report)
    }

    /// Remove `identity`'s bindings to each role and every role no one else
    /// holds
    pub fn unassign(&self, identity: &str, roles: &[String]) -> Result<RunReport> {
        let resolution = self.resolver.resolve(identity)?;
        let report = self.teardown.teardown(&resolution.identity, roles)?;
        info!(identity = %resolution.identity.display_name, summary = %report.summary(), "teardown finished");
        Ok(report)
    }

    pub fn identify_locks(&self, resource_group: &str) -> Result<LockSnapshot> {
        self.locks.identify(resource_group)
    }

    pub fn remove_locks(&self, resource_group: &str, snapshot: Option<LockSnapshot>) -> Result<RunReport> {
        let (_, report) = self.locks.remove(resource_group, snapshot)?;
        Ok(report)
    }

    pub fn restore_locks(&self, resource_group: &str, snapshot: &LockSnapshot) -> Result<RunReport> {
        self.locks.restore(resource_group, snapshot)
    }
}
