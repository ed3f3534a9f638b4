//! Cross-handle exclusivity of the instance slot lease.
//!
//! Advisory file locks conflict across open handles even within one
//! process, so these tests model concurrent bridge instances without
//! spawning child processes.

use std::thread;

use serial_bridge::InstanceLease;

#[test]
fn same_scope_acquisitions_get_distinct_slots() {
    let dir = tempfile::tempdir().unwrap();
    let seed = "shared-installation";

    let first = InstanceLease::acquire_in(dir.path(), seed).unwrap();
    let second = InstanceLease::acquire_in(dir.path(), seed).unwrap();

    assert_eq!(first.instance_id(), 1);
    assert_eq!(second.instance_id(), 2);
}

#[test]
fn released_slot_is_reclaimed_first() {
    let dir = tempfile::tempdir().unwrap();
    let seed = "reclaim-scope";

    let first = InstanceLease::acquire_in(dir.path(), seed).unwrap();
    let second = InstanceLease::acquire_in(dir.path(), seed).unwrap();
    assert_eq!(first.instance_id(), 1);
    assert_eq!(second.instance_id(), 2);

    drop(first);

    let third = InstanceLease::acquire_in(dir.path(), seed).unwrap();
    assert_eq!(
        third.instance_id(),
        1,
        "the lowest released slot must be reclaimed"
    );
    assert_eq!(second.instance_id(), 2, "held slots stay held");
}

#[test]
fn concurrent_acquisitions_never_share_a_slot() {
    let dir = tempfile::tempdir().unwrap();
    let seed = "race-scope";

    let leases: Vec<InstanceLease> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| InstanceLease::acquire_in(dir.path(), seed).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut ids: Vec<u16> = leases.iter().map(|l| l.instance_id()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4, "every acquisition must own a unique slot");
}

#[test]
fn lock_files_are_scoped_by_seed_hash() {
    let dir = tempfile::tempdir().unwrap();

    let a = InstanceLease::acquire_in(dir.path(), "install-a").unwrap();
    let b = InstanceLease::acquire_in(dir.path(), "install-b").unwrap();

    // Different scopes both get slot 1, under different lock files.
    assert_eq!(a.instance_id(), 1);
    assert_eq!(b.instance_id(), 1);
    assert_ne!(a.lock_path(), b.lock_path());
}
