//! Principal identity types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of directory principal an assignment is granted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    /// Heuristic guess from a human-supplied identity: anything containing
    /// `@` looks like a user principal name, everything else like a group.
    pub fn hint_for(raw: &str) -> Self {
        if raw.contains('@') {
            PrincipalKind::User
        } else {
            PrincipalKind::Group
        }
    }

    /// The kind to fall back to when the hinted one does not resolve
    pub fn other(self) -> Self {
        match self {
            PrincipalKind::User => PrincipalKind::Group,
            PrincipalKind::Group => PrincipalKind::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        }
    }

    /// Capitalized label used when composing role names
    pub fn label(self) -> &'static str {
        match self {
            PrincipalKind::User => "User",
            PrincipalKind::Group => "Group",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved directory principal
///
/// Resolved once per invocation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Directory object id
    pub id: String,

    /// Confirmed kind (may differ from the hint used to look it up)
    pub kind: PrincipalKind,

    /// Display name, or the user principal name for users
    pub display_name: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, kind: PrincipalKind, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: display_name.into(),
        }
    }

    pub fn user(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(id, PrincipalKind::User, display_name)
    }

    pub fn group(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(id, PrincipalKind::Group, display_name)
    }
}
