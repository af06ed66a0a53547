//! Lock capture, lift and restore

use apim_access_core::{InMemoryBackend, LockLevel, LockSnapshot, ResourceLock};
use apim_access_reconcile::LockSnapshotManager;
use proptest::prelude::*;
use std::sync::Arc;

fn manager(backend: InMemoryBackend) -> (LockSnapshotManager, Arc<InMemoryBackend>) {
    let backend = Arc::new(backend);
    (LockSnapshotManager::new(backend.clone()), backend)
}

/// The fields compared by restore equivalence
fn essentials(locks: &[ResourceLock]) -> Vec<(Option<String>, Option<LockLevel>, Option<String>)> {
    let mut out: Vec<_> = locks
        .iter()
        .map(|l| (l.name.clone(), l.level, l.notes.clone()))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_identify_on_unlocked_group_is_empty_array() {
    let (manager, _) = manager(InMemoryBackend::new());
    let snapshot = manager.identify("rg-empty").unwrap();
    assert_eq!(snapshot.to_json().unwrap(), "[]");
}

#[test]
fn test_remove_then_restore_from_json() {
    let (manager, backend) = manager(InMemoryBackend::new().with_lock(
        "rg",
        ResourceLock::new("L1", LockLevel::CanNotDelete, "lockA", Some("x".into())),
    ));
    let snapshot =
        LockSnapshot::from_json(r#"[{"id":"L1","level":"CanNotDelete","name":"lockA","notes":"x"}]"#).unwrap();

    let (_, removed) = manager.remove("rg", Some(snapshot.clone())).unwrap();
    assert!(!removed.has_failures());
    assert!(backend.locks("rg").is_empty());

    let restored = manager.restore("rg", &snapshot).unwrap();
    assert!(!restored.has_failures());

    let locks = backend.locks("rg");
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].name.as_deref(), Some("lockA"));
    assert_eq!(locks[0].level, Some(LockLevel::CanNotDelete));
    assert_eq!(locks[0].notes.as_deref(), Some("x"));
}

#[test]
fn test_snapshot_is_a_detached_value() {
    let (manager, backend) = manager(InMemoryBackend::new().with_lock(
        "rg",
        ResourceLock::new("L1", LockLevel::ReadOnly, "freeze", None),
    ));

    let snapshot = manager.identify("rg").unwrap();
    let json = snapshot.to_json().unwrap();
    manager.remove("rg", None).unwrap();

    // The serialized snapshot still describes the lock after it is gone
    assert!(backend.locks("rg").is_empty());
    let reloaded = LockSnapshot::from_json(&json).unwrap();
    assert_eq!(reloaded, snapshot);
    manager.restore("rg", &reloaded).unwrap();
    assert_eq!(essentials(&backend.locks("rg")), essentials(snapshot.locks()));
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn lock_strategy() -> impl Strategy<Value = (String, bool, Option<String>)> {
    ("[a-z][a-z0-9-]{0,12}", any::<bool>(), proptest::option::of("[ -~]{0,20}"))
}

proptest! {
    #[test]
    fn test_restore_of_removed_snapshot_is_equivalent(
        entries in proptest::collection::vec(lock_strategy(), 0..8)
    ) {
        let mut backend = InMemoryBackend::new();
        let mut seen = std::collections::HashSet::new();
        for (name, read_only, notes) in &entries {
            if !seen.insert(name.clone()) {
                continue;
            }
            let level = if *read_only { LockLevel::ReadOnly } else { LockLevel::CanNotDelete };
            backend = backend.with_lock("rg", ResourceLock::new(format!("id-{}", name), level, name.clone(), notes.clone()));
        }
        let (manager, backend) = manager(backend);

        let original = manager.identify("rg").unwrap();
        let (removed, _) = manager.remove("rg", None).unwrap();
        prop_assert!(backend.locks("rg").is_empty());
        manager.restore("rg", &removed).unwrap();

        prop_assert_eq!(essentials(&backend.locks("rg")), essentials(original.locks()));
    }
}
