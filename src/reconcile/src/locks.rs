//! Capture, lift and restore of resource group locks
//!
//! Locks are advisory metadata, so nothing here retries: every lock is
//! attempted once and individual failures are recorded in the report.

use crate::error::{ReconcileError, Result};
use crate::outcome::{OutcomeStatus, RunReport};
use apim_access_core::{LockClient, LockLevel, LockSnapshot, ResourceLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot-based lock management for one resource group at a time
#[derive(Clone)]
pub struct LockSnapshotManager {
    client: Arc<dyn LockClient>,
}

impl LockSnapshotManager {
    pub fn new(client: Arc<dyn LockClient>) -> Self {
        Self { client }
    }

    /// Capture the locks on `resource_group`; an unlocked group yields an
    /// empty snapshot
    pub fn identify(&self, resource_group: &str) -> Result<LockSnapshot> {
        let group = non_empty(resource_group)?;
        let locks = self.client.list_locks(group)?;
        info!(resource_group = group, count = locks.len(), "locks identified");
        Ok(LockSnapshot::new(locks))
    }

    /// Delete every lock in `snapshot`, or in a fresh capture when none is
    /// given. Returns the snapshot that was acted on.
    ///
    /// Best effort: every failure, authorization included, is recorded and
    /// the remaining locks are still attempted.
    pub fn remove(&self, resource_group: &str, snapshot: Option<LockSnapshot>) -> Result<(LockSnapshot, RunReport)> {
        let group = non_empty(resource_group)?;
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => self.identify(group)?,
        };

        let mut report = RunReport::new();
        for lock in snapshot.locks() {
            let Some(name) = lock.name.as_deref().filter(|n| !n.trim().is_empty()) else {
                warn!(resource_group = group, id = ?lock.id, "lock without a name cannot be removed");
                report.warn(lock.id.clone().unwrap_or_else(|| "<unnamed>".into()), "lock has no name");
                continue;
            };

            match self.client.delete_lock(group, name) {
                Ok(()) => {
                    info!(resource_group = group, lock = name, "lock removed");
                    report.record(name, OutcomeStatus::Deleted);
                }
                Err(err) if err.is_not_found() => {
                    info!(resource_group = group, lock = name, "lock already gone");
                    report.skipped(name, "already removed");
                }
                Err(err) => {
                    warn!(resource_group = group, lock = name, error = %err, "could not remove lock");
                    report.fail(name, err.to_string());
                }
            }
        }
        Ok((snapshot, report))
    }

    /// Recreate every usable entry of `snapshot` with its original name,
    /// level and notes.
    ///
    /// Entries without a name or a concrete level are skipped with a
    /// warning. When several entries share a name only the first is
    /// recreated.
    pub fn restore(&self, resource_group: &str, snapshot: &LockSnapshot) -> Result<RunReport> {
        let group = non_empty(resource_group)?;
        let mut report = RunReport::new();
        let mut restored = HashSet::new();

        for (idx, lock) in snapshot.locks().iter().enumerate() {
            let (name, level) = match restorable(lock) {
                Ok(pair) => pair,
                Err(reason) => {
                    let unit = lock.name.clone().unwrap_or_else(|| format!("entry {}", idx));
                    warn!(resource_group = group, entry = idx, reason, "skipping lock entry");
                    report.warn(unit, reason);
                    continue;
                }
            };

            if !restored.insert(name.to_string()) {
                warn!(resource_group = group, lock = name, "duplicate lock name in snapshot, keeping the first");
                report.skipped(format!("{} (entry {})", name, idx), "duplicate name");
                continue;
            }

            match self.client.create_lock(group, name, level, lock.notes.as_deref()) {
                Ok(_) => {
                    info!(resource_group = group, lock = name, level = %level, "lock restored");
                    report.record(name, OutcomeStatus::Restored);
                }
                Err(err) => {
                    warn!(resource_group = group, lock = name, error = %err, "could not restore lock");
                    report.fail(name, err.to_string());
                }
            }
        }

        let summary = report.summary();
        info!(resource_group = group, %summary, "lock restore finished");
        Ok(report)
    }
}

fn restorable(lock: &ResourceLock) -> std::result::Result<(&str, LockLevel), &'static str> {
    let name = lock
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or("missing name")?;
    match lock.level {
        Some(level) if level.is_concrete() => Ok((name, level)),
        Some(_) => Err("unsupported level"),
        None => Err("missing level"),
    }
}

fn non_empty(resource_group: &str) -> Result<&str> {
    let group = resource_group.trim();
    if group.is_empty() {
        return Err(ReconcileError::Input("resource group must not be empty".into()));
    }
    Ok(group)
}
