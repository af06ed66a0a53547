//! Resource Manager and Graph payload shapes
//!
//! ARM nests everything interesting under `properties`; these types map
//! that shape onto the flat core types and back.

use crate::error::{ArmError, Result};
use apim_access_core::{
    Identity, LockLevel, PrincipalKind, ResourceLock, RoleAssignment, RoleDefinition,
    RoleDefinitionRecord, RoleType,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

const ROLE_DEFINITIONS: &str = "providers/Microsoft.Authorization/roleDefinitions";

/// Namespace for deterministic resource names
const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b3d_4c57_8e21_0d5a_7f3b_91c4);

/// One page of a list response. ARM and Graph name the continuation
/// link differently.
#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub value: Vec<Value>,

    #[serde(default, rename = "nextLink", alias = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Permission {
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    not_actions: Vec<String>,
    #[serde(default)]
    data_actions: Vec<String>,
    #[serde(default)]
    not_data_actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionProperties {
    role_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    role_type: Option<String>,
    #[serde(default)]
    permissions: Vec<Permission>,
    #[serde(default)]
    assignable_scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArmDefinition {
    id: String,
    properties: DefinitionProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentProperties {
    role_definition_id: String,
    principal_id: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct ArmAssignment {
    id: String,
    properties: AssignmentProperties,
}

#[derive(Debug, Default, Deserialize)]
struct LockProperties {
    #[serde(default)]
    level: Option<LockLevel>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArmLock {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    properties: LockProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphPrincipal {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ArmError::Decode(format!("{}: {}", what, e)))
}

/// Last path segment of a resource id
fn leaf(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}

/// GUID under which a custom role with this name is created
pub fn definition_guid(role_name: &str) -> Uuid {
    Uuid::new_v5(&NAME_NAMESPACE, format!("role:{}", role_name).as_bytes())
}

/// GUID for a `(principal, role, scope)` binding
pub fn assignment_guid(principal_id: &str, role_definition_id: &str, scope: &str) -> Uuid {
    let key = format!(
        "assignment:{}|{}|{}",
        principal_id.to_ascii_lowercase(),
        leaf(role_definition_id).to_ascii_lowercase(),
        scope.trim_end_matches('/').to_ascii_lowercase()
    );
    Uuid::new_v5(&NAME_NAMESPACE, key.as_bytes())
}

/// Canonical subscription-level id of a role definition.
///
/// ARM reports the same definition under whichever scope it was read at;
/// ids are normalized so that definitions and assignments compare equal.
pub fn canonical_definition_id(subscription_scope: &str, id: &str) -> String {
    format!("{}/{}/{}", subscription_scope, ROLE_DEFINITIONS, leaf(id))
}

/// Whether two role definition ids name the same definition
pub fn same_definition(a: &str, b: &str) -> bool {
    leaf(a).eq_ignore_ascii_case(leaf(b))
}

/// Quote a value for an OData `$filter` string literal
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn definition_body(definition: &RoleDefinition) -> Value {
    json!({
        "properties": {
            "roleName": definition.name,
            "description": definition.description,
            "type": "CustomRole",
            "permissions": [{
                "actions": definition.actions,
                "notActions": definition.not_actions,
                "dataActions": definition.data_actions,
                "notDataActions": definition.not_data_actions,
            }],
            "assignableScopes": definition.assignable_scopes,
        }
    })
}

pub fn parse_definition(subscription_scope: &str, value: Value) -> Result<RoleDefinitionRecord> {
    let raw: ArmDefinition = decode("role definition", value)?;
    let props = raw.properties;

    let mut actions = BTreeSet::new();
    let mut not_actions = BTreeSet::new();
    let mut data_actions = BTreeSet::new();
    let mut not_data_actions = BTreeSet::new();
    for permission in props.permissions {
        actions.extend(permission.actions);
        not_actions.extend(permission.not_actions);
        data_actions.extend(permission.data_actions);
        not_data_actions.extend(permission.not_data_actions);
    }

    let role_type = match props.role_type.as_deref() {
        Some(t) if t.eq_ignore_ascii_case("BuiltInRole") => RoleType::BuiltIn,
        _ => RoleType::Custom,
    };

    Ok(RoleDefinitionRecord {
        id: canonical_definition_id(subscription_scope, &raw.id),
        role_type,
        definition: RoleDefinition {
            name: props.role_name,
            description: props.description.unwrap_or_default(),
            actions,
            not_actions,
            data_actions,
            not_data_actions,
            assignable_scopes: props.assignable_scopes,
        },
    })
}

pub fn assignment_body(principal: &Identity, role_definition_id: &str) -> Value {
    json!({
        "properties": {
            "roleDefinitionId": role_definition_id,
            "principalId": principal.id,
            "principalType": principal.kind.label(),
        }
    })
}

pub fn parse_assignment(subscription_scope: &str, value: Value) -> Result<RoleAssignment> {
    let raw: ArmAssignment = decode("role assignment", value)?;
    Ok(RoleAssignment {
        id: raw.id,
        role_definition_id: canonical_definition_id(subscription_scope, &raw.properties.role_definition_id),
        principal_id: raw.properties.principal_id,
        scope: raw.properties.scope,
    })
}

pub fn lock_body(level: LockLevel, notes: Option<&str>) -> Value {
    let mut properties = json!({ "level": level.as_str() });
    if let Some(notes) = notes {
        properties["notes"] = Value::String(notes.to_string());
    }
    json!({ "properties": properties })
}

pub fn parse_lock(value: Value) -> Result<ResourceLock> {
    let raw: ArmLock = decode("lock", value)?;
    Ok(ResourceLock {
        id: raw.id,
        level: raw.properties.level,
        name: raw.name,
        notes: raw.properties.notes,
    })
}

/// Whether a lock id belongs to the resource group itself rather than to a
/// resource inside it
pub fn is_group_level_lock(lock_id: &str, resource_group: &str) -> bool {
    let marker = format!(
        "/resourcegroups/{}/providers/microsoft.authorization/locks/",
        resource_group.to_ascii_lowercase()
    );
    lock_id.to_ascii_lowercase().contains(&marker)
}

pub fn parse_principal(kind: PrincipalKind, value: Value) -> Result<Identity> {
    let raw: GraphPrincipal = decode("directory object", value)?;
    let display_name = match kind {
        PrincipalKind::User => raw.user_principal_name.or(raw.display_name),
        PrincipalKind::Group => raw.display_name,
    }
    .unwrap_or_else(|| raw.id.clone());
    Ok(Identity {
        id: raw.id,
        kind,
        display_name,
    })
}
