//! JSON arguments accepted at the process boundary
//!
//! Every JSON argument may be passed inline or as `@path` to a file. A
//! single object where an array is expected is read as a one-element array,
//! which is what most shells' JSON serializers emit for one item.

use anyhow::{bail, Context, Result};
use apim_access_core::{LockSnapshot, RoleDefinition};
use serde::Deserialize;
use serde_json::Value;

/// Inline JSON, or the contents of the file named after `@`
pub fn read_json_arg(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path)),
        None => Ok(arg.to_string()),
    }
}

fn parse_value(json: &str, what: &str) -> Result<Value> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    let value: Value = serde_json::from_str(trimmed).with_context(|| format!("{} is not valid JSON", what))?;
    Ok(match value {
        Value::Null => Value::Array(Vec::new()),
        Value::Array(_) => value,
        other => Value::Array(vec![other]),
    })
}

/// A list of target names (`["orders", "billing"]`); blank entries are
/// dropped
pub fn parse_names(json: &str, what: &str) -> Result<Vec<String>> {
    let names: Vec<String> =
        serde_json::from_value(parse_value(json, what)?).with_context(|| format!("{} must be an array of strings", what))?;
    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleEntry {
    Name(String),
    Definition(RoleDefinition),
}

/// Role names to remove, given either as names or as role definition
/// payloads in either field casing
pub fn parse_role_names(json: &str) -> Result<Vec<String>> {
    let entries: Vec<RoleEntry> = serde_json::from_value(parse_value(json, "roles to delete")?)
        .context("roles to delete must be role names or role definition objects")?;

    let mut names = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = match entry {
            RoleEntry::Name(name) => name,
            RoleEntry::Definition(definition) => definition.name,
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("roles to delete contains an entry without a name");
        }
        names.push(name.to_string());
    }
    Ok(names)
}

/// A lock snapshot as written by the identify tool
pub fn parse_lock_snapshot(json: &str) -> Result<LockSnapshot> {
    serde_json::from_value(parse_value(json, "lock snapshot")?)
        .context("lock snapshot must be an array of {id, level, name, notes} objects")
}
