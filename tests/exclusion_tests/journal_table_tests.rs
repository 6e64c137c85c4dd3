//! Tests for JournalExclusionTable
//!
//! These tests verify:
//! - Records survive reopening the journal
//! - Torn tails are truncated on replay
//! - Creation is decided once across independent handles
//! - Conditional writes are decided once across independent handles

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use lakelog::config::ThroughputHints;
use lakelog::exclusion::{ExclusionTable, ExternalEntry, JournalExclusionTable, TableStatus};
use lakelog::LakeError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_journal() -> (TempDir, JournalExclusionTable) {
    let temp_dir = TempDir::new().unwrap();
    let table = JournalExclusionTable::open(temp_dir.path(), "delta_log");
    (temp_dir, table)
}

fn pending(version: u64) -> ExternalEntry {
    ExternalEntry::pending(
        "t/_delta_log",
        format!("{version:020}.json"),
        format!(".tmp/{version:020}.json.abc"),
        1_000 + version,
    )
}

fn reopen(dir: &Path) -> JournalExclusionTable {
    JournalExclusionTable::open(dir, "delta_log")
}

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_missing_journal_is_table_not_found() {
    let (_dir, table) = setup_temp_journal();

    assert!(matches!(
        table.get(&pending(0).key()),
        Err(LakeError::TableNotFound(ref name)) if name == "delta_log"
    ));
    assert!(!table.path().exists());
}

#[test]
fn test_journal_path() {
    let (dir, table) = setup_temp_journal();
    assert_eq!(table.path(), dir.path().join("delta_log.journal"));
}

#[test]
fn test_create_then_already_exists() {
    let (dir, table) = setup_temp_journal();

    assert_eq!(
        table.ensure_table_exists(&ThroughputHints::default()).unwrap(),
        TableStatus::Created
    );
    assert_eq!(
        table.ensure_table_exists(&ThroughputHints::default()).unwrap(),
        TableStatus::AlreadyExists
    );
    assert_eq!(
        reopen(dir.path())
            .ensure_table_exists(&ThroughputHints::default())
            .unwrap(),
        TableStatus::AlreadyExists
    );
}

#[test]
fn test_concurrent_creation_across_handles() {
    let dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let statuses: Vec<TableStatus> = (0..8)
        .map(|_| {
            let path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let table = JournalExclusionTable::open(&path, "delta_log");
                barrier.wait();
                table.ensure_table_exists(&ThroughputHints::default()).unwrap()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(
        statuses.iter().filter(|s| **s == TableStatus::Created).count(),
        1
    );
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_records_survive_reopen() {
    let (dir, table) = setup_temp_journal();
    table.ensure_table_exists(&ThroughputHints::default()).unwrap();

    let first = pending(0);
    let second = pending(1);
    assert!(table.put_if_absent(&first).unwrap());
    assert!(table.put_if_absent(&second).unwrap());
    assert!(table
        .compare_and_set(&first, &first.as_complete(2_000, 60))
        .unwrap());
    drop(table);

    let reopened = reopen(dir.path());
    let recovery = reopened.recover().unwrap();
    assert_eq!(recovery.frames_replayed, 4);
    assert_eq!(recovery.last_lsn, 4);
    assert!(!recovery.was_truncated);

    assert_eq!(reopened.record_count().unwrap(), 2);
    assert_eq!(
        reopened.get(&first.key()).unwrap(),
        Some(first.as_complete(2_000, 60))
    );
    assert_eq!(reopened.latest("t/_delta_log").unwrap(), Some(second.clone()));

    // decisions made before the restart still hold
    assert!(!reopened.put_if_absent(&pending(1)).unwrap());
    assert!(reopened.put_if_absent(&pending(2)).unwrap());
    assert_eq!(reopen(dir.path()).record_count().unwrap(), 3);
}

#[test]
fn test_failed_conditions_are_not_journaled() {
    let (dir, table) = setup_temp_journal();
    table.ensure_table_exists(&ThroughputHints::default()).unwrap();

    let entry = pending(0);
    table.put_if_absent(&entry).unwrap();
    assert!(!table.put_if_absent(&pending(0)).unwrap());
    assert!(!table
        .compare_and_set(&entry.as_complete(1, 1), &entry.as_complete(2, 2))
        .unwrap());
    drop(table);

    assert_eq!(reopen(dir.path()).recover().unwrap().last_lsn, 2);
}

#[test]
fn test_torn_tail_is_truncated() {
    let (dir, table) = setup_temp_journal();
    table.ensure_table_exists(&ThroughputHints::default()).unwrap();
    table.put_if_absent(&pending(0)).unwrap();
    let path = table.path().to_path_buf();
    drop(table);

    let clean_len = std::fs::metadata(&path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        // half a frame header
        file.write_all(&[3, 0, 0, 0, 0, 0, 0, 0, 0xde, 0xad]).unwrap();
    }

    let reopened = reopen(dir.path());
    let recovery = reopened.recover().unwrap();
    assert!(recovery.was_truncated);
    assert_eq!(recovery.last_lsn, 2);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);

    // appends continue from the last good frame
    assert!(reopened.put_if_absent(&pending(1)).unwrap());
    drop(reopened);

    let again = reopen(dir.path()).recover().unwrap();
    assert!(!again.was_truncated);
    assert_eq!(again.last_lsn, 3);
}

#[test]
fn test_corrupt_frame_ends_log() {
    let (dir, table) = setup_temp_journal();
    table.ensure_table_exists(&ThroughputHints::default()).unwrap();
    table.put_if_absent(&pending(0)).unwrap();
    table.put_if_absent(&pending(1)).unwrap();
    let path = table.path().to_path_buf();
    drop(table);

    // flip the last byte of the final frame
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let reopened = reopen(dir.path());
    let recovery = reopened.recover().unwrap();
    assert!(recovery.was_truncated);
    assert_eq!(recovery.frames_replayed, 2);
    assert_eq!(reopened.record_count().unwrap(), 1);
    assert_eq!(reopened.get(&pending(1).key()).unwrap(), None);
}

// =============================================================================
// Multi-Handle Tests
// =============================================================================

#[test]
fn test_handles_see_each_others_writes() {
    let (dir, first) = setup_temp_journal();
    first.ensure_table_exists(&ThroughputHints::default()).unwrap();
    let second = reopen(dir.path());

    // both handles have loaded the journal before either writes
    first.recover().unwrap();
    second.recover().unwrap();

    let entry = pending(0);
    assert!(first.put_if_absent(&entry).unwrap());
    assert!(!second.put_if_absent(&pending(0)).unwrap());
    assert_eq!(second.get(&entry.key()).unwrap(), Some(entry.clone()));

    let complete = entry.as_complete(2_000, 60);
    assert!(second.compare_and_set(&entry, &complete).unwrap());
    assert!(!first.compare_and_set(&entry, &entry.as_complete(3_000, 60)).unwrap());
    assert_eq!(first.get(&entry.key()).unwrap(), Some(complete.clone()));

    // later writes from either handle survive a fresh replay
    assert!(first.put_if_absent(&pending(1)).unwrap());
    assert!(second.put_if_absent(&pending(2)).unwrap());
    drop(first);
    drop(second);

    let third = reopen(dir.path());
    let recovery = third.recover().unwrap();
    assert!(!recovery.was_truncated);
    assert_eq!(recovery.last_lsn, 5);
    assert_eq!(third.record_count().unwrap(), 3);
    assert_eq!(third.get(&pending(0).key()).unwrap(), Some(complete));
    assert_eq!(third.get(&pending(1).key()).unwrap(), Some(pending(1)));
    assert_eq!(third.latest("t/_delta_log").unwrap(), Some(pending(2)));
}

#[test]
fn test_concurrent_put_if_absent_across_handles() {
    let (dir, table) = setup_temp_journal();
    table.ensure_table_exists(&ThroughputHints::default()).unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let results: Vec<(usize, bool)> = (0..8)
        .map(|i| {
            let path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let handle = JournalExclusionTable::open(&path, "delta_log");
                handle.recover().unwrap();
                barrier.wait();
                let won = handle
                    .put_if_absent(&ExternalEntry::pending(
                        "t/_delta_log",
                        format!("{:020}.json", 0),
                        format!(".tmp/{:020}.json.w{i}", 0),
                        1_000,
                    ))
                    .unwrap();
                // every handle also claims a version of its own
                assert!(handle.put_if_absent(&pending(10 + i as u64)).unwrap());
                (i, won)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    let winners: Vec<usize> = results.iter().filter(|(_, w)| *w).map(|(i, _)| *i).collect();
    assert_eq!(winners.len(), 1);

    let reopened = reopen(dir.path());
    let recovery = reopened.recover().unwrap();
    assert!(!recovery.was_truncated);
    assert_eq!(recovery.last_lsn, 1 + 1 + 8);
    assert_eq!(reopened.record_count().unwrap(), 9);
    assert_eq!(
        reopened.get(&pending(0).key()).unwrap().unwrap().temp_path,
        format!(".tmp/{:020}.json.w{}", 0, winners[0])
    );

    // the original handle catches up too
    assert_eq!(table.record_count().unwrap(), 9);
}
