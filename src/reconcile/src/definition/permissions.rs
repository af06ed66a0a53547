//! Fixed permission sets per granularity and the least-privilege boundary
//!
//! A synthesized role grants `ALLOW \ DENY` as `actions` and lists `DENY`
//! as `notActions`. No wildcard is ever granted.

use crate::error::{ReconcileError, Result};
use apim_access_core::{Granularity, RoleDefinition};
use std::collections::BTreeSet;

const PROVIDER: &str = "Microsoft.ApiManagement/service";

const API_ALLOW: &[&str] = &[
    "read",
    "apis/read",
    "apis/write",
    "apis/operations/read",
    "apis/operations/write",
    "apis/policies/read",
    "apis/policies/write",
    "apis/operations/policies/read",
    "apis/operations/policies/write",
    "apis/schemas/read",
    "apis/schemas/write",
    "apis/revisions/read",
    "apis/releases/read",
    "apis/releases/write",
    "apis/tags/read",
    "apis/operations/tags/read",
    "apis/diagnostics/read",
];

const API_DENY: &[&str] = &[
    "write",
    "delete",
    "apis/delete",
    "apis/operations/delete",
    "apis/policies/delete",
    "apis/operations/policies/delete",
    "apis/schemas/delete",
    "apis/revisions/delete",
    "apis/releases/delete",
];

const OPERATION_ALLOW: &[&str] = &[
    "read",
    "apis/read",
    "apis/operations/read",
    "apis/operations/write",
    "apis/operations/policies/read",
    "apis/operations/policies/write",
    "apis/operations/tags/read",
];

// API-level writes are out of reach for operation-scoped roles
const OPERATION_DENY: &[&str] = &[
    "write",
    "delete",
    "apis/write",
    "apis/delete",
    "apis/operations/delete",
    "apis/operations/policies/delete",
];

fn qualified(actions: &[&str]) -> BTreeSet<String> {
    actions.iter().map(|a| format!("{}/{}", PROVIDER, a)).collect()
}

/// The allow-list for a granularity, before the deny-list is subtracted
pub fn allow_list(granularity: Granularity) -> BTreeSet<String> {
    match granularity {
        Granularity::Api => qualified(API_ALLOW),
        Granularity::Operation => qualified(OPERATION_ALLOW),
    }
}

/// The explicit deny-list for a granularity
pub fn deny_list(granularity: Granularity) -> BTreeSet<String> {
    match granularity {
        Granularity::Api => qualified(API_DENY),
        Granularity::Operation => qualified(OPERATION_DENY),
    }
}

/// Granted actions and not-actions for a granularity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSet {
    pub actions: BTreeSet<String>,
    pub not_actions: BTreeSet<String>,
}

impl PermissionSet {
    pub fn for_granularity(granularity: Granularity) -> Self {
        let deny = deny_list(granularity);
        let actions = allow_list(granularity)
            .difference(&deny)
            .cloned()
            .collect();
        Self {
            actions,
            not_actions: deny,
        }
    }

    /// Write the set into a definition, replacing whatever was there
    pub fn apply_to(self, definition: &mut RoleDefinition) {
        definition.actions = self.actions;
        definition.not_actions = self.not_actions;
        definition.data_actions.clear();
        definition.not_data_actions.clear();
    }
}

/// Reject a definition that grants anything past the boundary.
///
/// Checked right before every create or update; a violation means the
/// permission tables are wrong and nothing must be written.
pub fn check_boundary(definition: &RoleDefinition, granularity: Granularity) -> Result<()> {
    let deny = deny_list(granularity);
    let violation = |action: &str| ReconcileError::LeastPrivilege {
        role: definition.name.clone(),
        action: action.to_string(),
    };

    for action in &definition.actions {
        let lower = action.to_ascii_lowercase();
        if lower.ends_with("/delete") || lower == "*" {
            return Err(violation(action));
        }
        if deny.iter().any(|d| glob_matches(&lower, &d.to_ascii_lowercase())) {
            return Err(violation(action));
        }
    }
    if let Some(missing) = deny.iter().find(|d| !definition.not_actions.contains(*d)) {
        return Err(violation(missing));
    }
    if let Some(action) = definition.data_actions.iter().next() {
        return Err(violation(action));
    }
    Ok(())
}

/// Match `text` against a pattern where `*` spans any run of characters
pub(crate) fn glob_matches(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    if !text.starts_with(first) {
        return false;
    }
    let mut remaining = &text[first.len()..];
    for (idx, part) in rest.iter().enumerate() {
        let last = idx == rest.len() - 1;
        if last {
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(granularity: Granularity) -> RoleDefinition {
        let mut def = RoleDefinition::new("APIM-User-alice-svc");
        PermissionSet::for_granularity(granularity).apply_to(&mut def);
        def
    }

    #[test]
    fn test_synthesized_sets_pass_the_boundary() {
        for granularity in [Granularity::Api, Granularity::Operation] {
            let def = definition(granularity);
            assert!(check_boundary(&def, granularity).is_ok(), "{}", granularity);
            assert!(def.actions.is_disjoint(&def.not_actions));
            assert!(def.actions.iter().all(|a| !a.contains('*')));
        }
    }

    #[test]
    fn test_granularities_differ_in_write_scope() {
        let api = PermissionSet::for_granularity(Granularity::Api);
        let op = PermissionSet::for_granularity(Granularity::Operation);
        let apis_write = format!("{}/apis/write", PROVIDER);

        assert!(api.actions.contains(&apis_write));
        assert!(!op.actions.contains(&apis_write));
        assert!(op.not_actions.contains(&apis_write));
        assert!(op.actions.is_subset(&api.actions));
    }

    #[test]
    fn test_service_write_never_granted() {
        for granularity in [Granularity::Api, Granularity::Operation] {
            let set = PermissionSet::for_granularity(granularity);
            assert!(!set.actions.contains(&format!("{}/write", PROVIDER)));
            assert!(set.not_actions.contains(&format!("{}/delete", PROVIDER)));
        }
    }

    #[test]
    fn test_boundary_rejects_delete_and_wildcards() {
        let mut def = definition(Granularity::Api);
        def.actions.insert(format!("{}/apis/tags/delete", PROVIDER));
        assert!(matches!(
            check_boundary(&def, Granularity::Api),
            Err(ReconcileError::LeastPrivilege { .. })
        ));

        let mut def = definition(Granularity::Operation);
        def.actions.insert(format!("{}/apis/*", PROVIDER));
        assert!(check_boundary(&def, Granularity::Operation).is_err());

        let mut def = definition(Granularity::Api);
        def.not_actions.clear();
        assert!(check_boundary(&def, Granularity::Api).is_err());
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches("a/*", "a/b/c"));
        assert!(glob_matches("*/write", "x/y/write"));
        assert!(glob_matches("a/*/delete", "a/b/c/delete"));
        assert!(!glob_matches("a/*/delete", "a/b/write"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("exact", "exactly"));
    }
}
