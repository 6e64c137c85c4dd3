//! Tests for MemoryExclusionTable
//!
//! These tests verify:
//! - Operations before creation report a missing table
//! - Idempotent, race-tolerant creation
//! - put_if_absent / compare_and_set semantics
//! - latest() ordering within a table partition

use std::sync::{Arc, Barrier};
use std::thread;

use lakelog::config::ThroughputHints;
use lakelog::exclusion::{EntryKey, ExclusionTable, ExternalEntry, MemoryExclusionTable, TableStatus};
use lakelog::LakeError;

// =============================================================================
// Helper Functions
// =============================================================================

fn pending(version: u64, temp: &str) -> ExternalEntry {
    ExternalEntry::pending("t/_delta_log", format!("{version:020}.json"), temp, 100)
}

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_operations_before_creation_fail() {
    let table = MemoryExclusionTable::new("missing");
    let entry = pending(0, ".tmp/a");

    assert!(matches!(table.put_if_absent(&entry), Err(LakeError::TableNotFound(_))));
    assert!(matches!(table.get(&entry.key()), Err(LakeError::TableNotFound(_))));
    assert!(matches!(
        table.compare_and_set(&entry, &entry.as_complete(1, 1)),
        Err(LakeError::TableNotFound(_))
    ));
    assert!(matches!(table.latest("t/_delta_log"), Err(LakeError::TableNotFound(_))));
}

#[test]
fn test_ensure_table_exists_is_idempotent() {
    let table = MemoryExclusionTable::new("delta_log");
    let hints = ThroughputHints {
        read_capacity_units: 10,
        write_capacity_units: 20,
    };

    assert_eq!(table.ensure_table_exists(&hints).unwrap(), TableStatus::Created);
    assert_eq!(
        table.ensure_table_exists(&ThroughputHints::default()).unwrap(),
        TableStatus::AlreadyExists
    );
    assert_eq!(table.creation_count(), 1);
    assert_eq!(table.throughput(), Some(hints));
}

#[test]
fn test_concurrent_creation_happens_once() {
    let table = Arc::new(MemoryExclusionTable::new("delta_log"));
    let barrier = Arc::new(Barrier::new(12));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                table.ensure_table_exists(&ThroughputHints::default()).unwrap()
            })
        })
        .collect();

    let statuses: Vec<TableStatus> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        statuses.iter().filter(|s| **s == TableStatus::Created).count(),
        1
    );
    assert_eq!(table.creation_count(), 1);
}

// =============================================================================
// Conditional Write Tests
// =============================================================================

#[test]
fn test_put_if_absent_first_wins() {
    let table = MemoryExclusionTable::created("delta_log");
    let first = pending(0, ".tmp/first");
    let second = pending(0, ".tmp/second");

    assert!(table.put_if_absent(&first).unwrap());
    assert!(!table.put_if_absent(&second).unwrap());
    assert_eq!(table.get(&first.key()).unwrap(), Some(first));
    assert_eq!(table.record_count(), 1);
}

#[test]
fn test_put_if_absent_race_single_winner() {
    let table = Arc::new(MemoryExclusionTable::created("delta_log"));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let entry = pending(3, &format!(".tmp/writer-{i}"));
                barrier.wait();
                (entry.clone(), table.put_if_absent(&entry).unwrap())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter(|(_, won)| *won).collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(
        table.get(&EntryKey::new("t/_delta_log", format!("{:020}.json", 3))).unwrap(),
        Some(winners[0].0.clone())
    );
}

#[test]
fn test_compare_and_set() {
    let table = MemoryExclusionTable::created("delta_log");
    let entry = pending(1, ".tmp/a");
    table.put_if_absent(&entry).unwrap();

    let done = entry.as_complete(200, 60);
    assert!(table.compare_and_set(&entry, &done).unwrap());
    assert_eq!(table.get(&entry.key()).unwrap(), Some(done.clone()));

    // stale expectation
    assert!(!table.compare_and_set(&entry, &entry.as_complete(300, 60)).unwrap());
    assert_eq!(table.get(&entry.key()).unwrap(), Some(done));
}

#[test]
fn test_compare_and_set_on_absent_record() {
    let table = MemoryExclusionTable::created("delta_log");
    let entry = pending(1, ".tmp/a");

    assert!(!table.compare_and_set(&entry, &entry.as_complete(1, 1)).unwrap());
    assert_eq!(table.get(&entry.key()).unwrap(), None);
}

#[test]
fn test_compare_and_set_cannot_change_key() {
    let table = MemoryExclusionTable::created("delta_log");
    let entry = pending(1, ".tmp/a");
    table.put_if_absent(&entry).unwrap();

    let moved = pending(2, ".tmp/a");
    assert!(matches!(
        table.compare_and_set(&entry, &moved),
        Err(LakeError::Config(_))
    ));
}

// =============================================================================
// latest() Tests
// =============================================================================

#[test]
fn test_latest_per_table() {
    let table = MemoryExclusionTable::created("delta_log");
    assert_eq!(table.latest("t/_delta_log").unwrap(), None);

    for v in [3u64, 11, 7] {
        table.put_if_absent(&pending(v, ".tmp/x")).unwrap();
    }
    table
        .put_if_absent(&ExternalEntry::pending("u/_delta_log", format!("{:020}.json", 99), ".tmp/y", 1))
        .unwrap();

    let latest = table.latest("t/_delta_log").unwrap().unwrap();
    assert_eq!(latest.file_name, format!("{:020}.json", 11));
    assert_eq!(table.latest("u/_delta_log").unwrap().unwrap().table_path, "u/_delta_log");
    assert_eq!(table.latest("v/_delta_log").unwrap(), None);
}
