//! Target scope construction with existence probes

use super::types::{ResourceScope, ServiceRef};
use crate::error::{ReconcileError, Result};
use crate::outcome::RunReport;
use apim_access_core::{BackendError, Granularity, RoleClient};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validated scopes for one provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetScopes {
    pub granularity: Granularity,
    pub service: ServiceRef,
    /// Resource component of the derived role name
    pub resource_name: String,
    /// Existing target scopes, in input order
    pub scopes: Vec<ResourceScope>,
    /// Names that were dropped, with the reason
    pub dropped: Vec<(String, String)>,
}

impl TargetScopes {
    pub fn paths(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// Turns target resource names into probed, hierarchical scopes
#[derive(Clone)]
pub struct ScopeBuilder {
    client: Arc<dyn RoleClient>,
}

impl ScopeBuilder {
    pub fn new(client: Arc<dyn RoleClient>) -> Self {
        Self { client }
    }

    /// Scopes for whole APIs of a service
    pub fn api_scopes(
        &self,
        service: &ServiceRef,
        api_names: &[String],
        report: &mut RunReport,
    ) -> Result<TargetScopes> {
        let mut targets = TargetScopes {
            granularity: Granularity::Api,
            service: service.clone(),
            resource_name: service.service_name.clone(),
            scopes: Vec::new(),
            dropped: Vec::new(),
        };
        for name in dedupe(api_names) {
            let candidate = service.api_scope(name);
            self.admit(&mut targets, name, candidate, report)?;
        }
        finish(targets)
    }

    /// Scopes for individual operations of one API
    ///
    /// The parent API must exist; an operation scope under a missing API is
    /// never valid.
    pub fn operation_scopes(
        &self,
        service: &ServiceRef,
        api_name: &str,
        operation_names: &[String],
        report: &mut RunReport,
    ) -> Result<TargetScopes> {
        let api_scope = service
            .api_scope(api_name)
            .map_err(|e| ReconcileError::ScopeValidation(e.to_string()))?;
        match self.probe(&api_scope)? {
            Ok(true) => {}
            Ok(false) => {
                return Err(ReconcileError::ScopeValidation(format!(
                    "API '{}' does not exist at {}",
                    api_name, api_scope
                )))
            }
            Err(err) => {
                return Err(ReconcileError::ScopeValidation(format!(
                    "could not confirm API '{}': {}",
                    api_name, err
                )))
            }
        }

        let mut targets = TargetScopes {
            granularity: Granularity::Operation,
            service: service.clone(),
            resource_name: format!("{}.{}", service.service_name, api_name.trim()),
            scopes: Vec::new(),
            dropped: Vec::new(),
        };
        for name in dedupe(operation_names) {
            let candidate = service.operation_scope(api_name, name);
            self.admit(&mut targets, name, candidate, report)?;
        }
        finish(targets)
    }

    fn admit(
        &self,
        targets: &mut TargetScopes,
        name: &str,
        candidate: super::ScopeResult<ResourceScope>,
        report: &mut RunReport,
    ) -> Result<()> {
        let reason = match candidate {
            Err(err) => err.to_string(),
            Ok(scope) => match self.probe(&scope)? {
                Ok(true) => {
                    debug!(scope = %scope, "target confirmed");
                    targets.scopes.push(scope);
                    return Ok(());
                }
                Ok(false) => format!("{} does not exist", scope),
                Err(err) => format!("could not probe {}: {}", scope, err),
            },
        };

        warn!(target = name, reason = %reason, "dropping target");
        report.warn(format!("target {}", name), reason.clone());
        targets.dropped.push((name.to_string(), reason));
        Ok(())
    }

    /// Outer error is fatal (authorization), inner error drops the target
    fn probe(&self, scope: &ResourceScope) -> Result<std::result::Result<bool, BackendError>> {
        match self.client.resource_exists(scope.as_str()) {
            Ok(exists) => Ok(Ok(exists)),
            Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
            Err(err) => Ok(Err(err)),
        }
    }
}

fn dedupe(names: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| seen.insert(n.to_ascii_lowercase()))
        .collect()
}

fn finish(targets: TargetScopes) -> Result<TargetScopes> {
    if targets.scopes.is_empty() {
        return Err(ReconcileError::ScopeValidation(format!(
            "none of the requested {} targets exist ({} dropped)",
            targets.granularity,
            targets.dropped.len()
        )));
    }
    info!(
        granularity = %targets.granularity,
        valid = targets.scopes.len(),
        dropped = targets.dropped.len(),
        "target scopes built"
    );
    Ok(targets)
}
