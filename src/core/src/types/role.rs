//! Role definition and role assignment types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Granularity a custom role is synthesized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Grants over whole APIs of one service instance
    Api,
    /// Grants over individual operations of one API
    Operation,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Api => "api",
            Granularity::Operation => "operation",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role definition payload
///
/// Field names are written in camelCase. Reading also accepts the PascalCase
/// form some backend API versions and tooling emit (`Name`, `Actions`,
/// `AssignableScopes`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    /// Deterministic role name
    #[serde(alias = "Name", alias = "roleName", alias = "RoleName")]
    pub name: String,

    #[serde(default, alias = "Description")]
    pub description: String,

    /// Allowed control-plane actions
    #[serde(default, alias = "Actions")]
    pub actions: BTreeSet<String>,

    /// Control-plane actions carved out of `actions`
    #[serde(default, alias = "NotActions")]
    pub not_actions: BTreeSet<String>,

    #[serde(default, alias = "DataActions")]
    pub data_actions: BTreeSet<String>,

    #[serde(default, alias = "NotDataActions")]
    pub not_data_actions: BTreeSet<String>,

    /// Scopes the role may be assigned at, parent-to-child order
    #[serde(default, alias = "AssignableScopes")]
    pub assignable_scopes: Vec<String>,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Whether a role is provided by the platform or defined by a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleType {
    #[serde(rename = "BuiltInRole")]
    BuiltIn,
    #[serde(rename = "CustomRole")]
    Custom,
}

/// A role definition as it exists in the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinitionRecord {
    /// Backend identifier of the definition
    pub id: String,
    pub role_type: RoleType,
    pub definition: RoleDefinition,
}

impl RoleDefinitionRecord {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_custom(&self) -> bool {
        self.role_type == RoleType::Custom
    }
}

/// Binding of one principal to one role definition at one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    #[serde(alias = "Id", alias = "RoleAssignmentId")]
    pub id: String,

    #[serde(alias = "RoleDefinitionId")]
    pub role_definition_id: String,

    #[serde(alias = "PrincipalId", alias = "ObjectId")]
    pub principal_id: String,

    #[serde(alias = "Scope")]
    pub scope: String,
}
