//! Identity resolution with user/group fallback
//!
//! The kind hint is only a heuristic (`@` means user). Resolution tries the
//! hinted kind, then the other one, and reports the kind that actually
//! matched: role names are derived from the confirmed kind, never the hint.

use crate::error::{ReconcileError, Result};
use apim_access_core::{BackendError, DirectoryClient, Identity, PrincipalKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A resolved identity together with the kind it was first looked up as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: Identity,
    pub hinted: PrincipalKind,
}

impl Resolution {
    pub fn confirmed_kind(&self) -> PrincipalKind {
        self.identity.kind
    }

    /// Whether the principal turned out to be of the other kind
    pub fn kind_differs(&self) -> bool {
        self.identity.kind != self.hinted
    }
}

/// Resolves human-supplied identity strings into principals
#[derive(Clone)]
pub struct IdentityResolver {
    client: Arc<dyn DirectoryClient>,
}

impl IdentityResolver {
    pub fn new(client: Arc<dyn DirectoryClient>) -> Self {
        Self { client }
    }

    /// Resolve `raw`, trying the hinted kind first and the other kind second.
    ///
    /// An authorization-denied lookup is fatal right away; any other lookup
    /// error counts as a miss for that kind.
    pub fn resolve(&self, raw: &str) -> Result<Resolution> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ReconcileError::Input("identity must not be empty".into()));
        }

        let hinted = PrincipalKind::hint_for(name);
        let alternate = hinted.other();

        if let Some(identity) = self.try_kind(name, hinted)? {
            info!(identity = %identity.display_name, id = %identity.id, kind = %identity.kind, "identity resolved");
            return Ok(Resolution { identity, hinted });
        }

        debug!(identity = name, hinted = %hinted, "hinted kind did not resolve, trying {}", alternate);
        if let Some(identity) = self.try_kind(name, alternate)? {
            warn!(
                identity = %identity.display_name,
                id = %identity.id,
                hinted = %hinted,
                confirmed = %identity.kind,
                "identity resolved as a different kind than hinted"
            );
            return Ok(Resolution { identity, hinted });
        }

        Err(ReconcileError::IdentityResolution {
            identity: name.to_string(),
            hinted,
            alternate,
        })
    }

    fn try_kind(&self, name: &str, kind: PrincipalKind) -> Result<Option<Identity>> {
        match self.client.find_principal(name, kind) {
            Ok(Some(identity)) if !identity.id.is_empty() => Ok(Some(Identity { kind, ..identity })),
            Ok(_) => Ok(None),
            Err(BackendError::AuthorizationDenied(msg)) => Err(ReconcileError::Authorization(msg)),
            Err(err) => {
                warn!(identity = name, kind = %kind, error = %err, "identity lookup failed");
                Ok(None)
            }
        }
    }
}
