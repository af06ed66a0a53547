//! Administrative lock types and the lock snapshot value

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lock level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockLevel {
    CanNotDelete,
    ReadOnly,
    /// Any level the backend reports that we cannot recreate
    #[serde(other)]
    NotSpecified,
}

impl LockLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LockLevel::CanNotDelete => "CanNotDelete",
            LockLevel::ReadOnly => "ReadOnly",
            LockLevel::NotSpecified => "NotSpecified",
        }
    }

    /// Whether a lock with this level can be recreated
    pub fn is_concrete(self) -> bool {
        !matches!(self, LockLevel::NotSpecified)
    }
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One administrative lock on a resource group
///
/// Every field is optional on input: snapshots are edited and stored by
/// callers, and entries missing `name` or `level` are skipped on restore
/// rather than rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLock {
    #[serde(default, alias = "Id", alias = "LockId")]
    pub id: Option<String>,

    #[serde(default, alias = "Level")]
    pub level: Option<LockLevel>,

    #[serde(default, alias = "Name", alias = "LockName")]
    pub name: Option<String>,

    #[serde(default, alias = "Notes")]
    pub notes: Option<String>,
}

impl ResourceLock {
    pub fn new(
        id: impl Into<String>,
        level: LockLevel,
        name: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            level: Some(level),
            name: Some(name.into()),
            notes,
        }
    }
}

/// Locks captured from one resource group at one instant
///
/// A plain value: it holds no handle into the live system and serializes as
/// a bare JSON array of `{id, level, name, notes}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockSnapshot(Vec<ResourceLock>);

impl LockSnapshot {
    pub fn new(locks: Vec<ResourceLock>) -> Self {
        Self(locks)
    }

    pub fn locks(&self) -> &[ResourceLock] {
        &self.0
    }

    pub fn into_locks(self) -> Vec<ResourceLock> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Vec<ResourceLock>> for LockSnapshot {
    fn from(locks: Vec<ResourceLock>) -> Self {
        Self(locks)
    }
}
