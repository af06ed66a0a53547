//! Resource scope type definitions and validation
//!
//! Scopes are Azure resource ids rooted at one API Management service
//! instance. They form a three-level hierarchy:
//!
//! - service: `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ApiManagement/service/{svc}`
//! - API: `{service}/apis/{api}`
//! - operation: `{service}/apis/{api}/operations/{op}`

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Result type for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors that can occur while building a scope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// Empty name segment provided
    #[error("{0} must not be empty")]
    EmptySegment(&'static str),
    /// Segment contains characters that cannot appear in a resource id
    #[error("Invalid {kind} '{value}'")]
    InvalidSegment { kind: &'static str, value: String },
}

const APIM_PROVIDER: &str = "Microsoft.ApiManagement/service";

fn is_valid_segment(value: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._~()-]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

fn check_segment(kind: &'static str, value: &str) -> ScopeResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ScopeError::EmptySegment(kind));
    }
    if !is_valid_segment(value) {
        return Err(ScopeError::InvalidSegment {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Level of a scope in the service hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeLevel {
    Service,
    Api,
    Operation,
}

/// Coordinates of one API Management service instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

impl ServiceRef {
    /// Creates a validated service reference
    pub fn new(subscription_id: &str, resource_group: &str, service_name: &str) -> ScopeResult<Self> {
        Ok(Self {
            subscription_id: check_segment("subscription id", subscription_id)?,
            resource_group: check_segment("resource group", resource_group)?,
            service_name: check_segment("service name", service_name)?,
        })
    }

    /// The service-level scope
    pub fn scope(&self) -> ResourceScope {
        ResourceScope {
            level: ScopeLevel::Service,
            path: format!(
                "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
                self.subscription_id, self.resource_group, APIM_PROVIDER, self.service_name
            ),
        }
    }

    /// Scope of one API within this service
    pub fn api_scope(&self, api: &str) -> ScopeResult<ResourceScope> {
        let api = check_segment("API name", api)?;
        Ok(ResourceScope {
            level: ScopeLevel::Api,
            path: format!("{}/apis/{}", self.scope().path, api),
        })
    }

    /// Scope of one operation of an API within this service
    pub fn operation_scope(&self, api: &str, operation: &str) -> ScopeResult<ResourceScope> {
        let api_scope = self.api_scope(api)?;
        let operation = check_segment("operation name", operation)?;
        Ok(ResourceScope {
            level: ScopeLevel::Operation,
            path: format!("{}/operations/{}", api_scope.path, operation),
        })
    }
}

/// A hierarchical resource path a role can be assigned at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceScope {
    level: ScopeLevel,
    path: String,
}

impl ResourceScope {
    pub fn level(&self) -> ScopeLevel {
        self.level
    }

    /// Returns the raw resource id
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Returns the enclosing scope, `None` for a service scope
    pub fn parent(&self) -> Option<Self> {
        let (marker, level) = match self.level {
            ScopeLevel::Service => return None,
            ScopeLevel::Api => ("/apis/", ScopeLevel::Service),
            ScopeLevel::Operation => ("/operations/", ScopeLevel::Api),
        };
        self.path.rfind(marker).map(|idx| Self {
            level,
            path: self.path[..idx].to_string(),
        })
    }

    /// Checks whether `self` equals `other` or lies beneath it
    ///
    /// Resource ids compare case-insensitively.
    pub fn is_within(&self, other: &str) -> bool {
        is_within(&self.path, other)
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Whether resource id `path` equals `root` or lies beneath it
pub fn is_within(path: &str, root: &str) -> bool {
    let path = path.trim_end_matches('/').to_ascii_lowercase();
    let root = root.trim_end_matches('/').to_ascii_lowercase();
    path == root || path.starts_with(&format!("{}/", root))
}
