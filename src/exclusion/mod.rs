//! Exclusion Table Module
//!
//! The linearizable key/value table that decides commit races when the
//! object store cannot.
//!
//! ## Responsibilities
//! - `put_if_absent`: the single write that makes a writer the winner
//! - `compare_and_set`: pending -> complete transition and repair
//! - `ensure_table_exists`: idempotent, race-tolerant creation
//!
//! ## Backends
//! - `MemoryExclusionTable`: process-local, for tests and embedding
//! - `JournalExclusionTable`: durable, CRC-framed journal on local disk

mod item;
mod journal;
mod memory;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::ThroughputHints;
use crate::error::Result;

pub use item::{
    AttributeValue, EntryKey, ExternalEntry, Item, ATTR_COMMIT_TIME, ATTR_COMPLETE,
    ATTR_EXPIRE_TIME, ATTR_FILE_NAME, ATTR_TABLE_PATH, ATTR_TEMP_PATH,
};
pub use journal::{JournalExclusionTable, JournalRecovery};
pub use memory::MemoryExclusionTable;

/// Result of `ensure_table_exists`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    /// This call created the table
    Created,

    /// The table was already there (possibly created by a concurrent caller)
    AlreadyExists,
}

/// Mutual exclusion table contract
///
/// Implementations must evaluate `put_if_absent` and `compare_and_set`
/// atomically with respect to every other caller that can reach the table.
pub trait ExclusionTable: Send + Sync + fmt::Debug {
    /// Table name (stable identifier)
    fn name(&self) -> &str;

    /// Create the table if needed; "already exists" is success
    fn ensure_table_exists(&self, hints: &ThroughputHints) -> Result<TableStatus>;

    /// Insert `entry` only if no record has its key. `true` = this call created it.
    fn put_if_absent(&self, entry: &ExternalEntry) -> Result<bool>;

    fn get(&self, key: &EntryKey) -> Result<Option<ExternalEntry>>;

    /// Replace `expected` with `updated` only if the stored record still equals `expected`
    fn compare_and_set(&self, expected: &ExternalEntry, updated: &ExternalEntry) -> Result<bool>;

    /// Record with the greatest file name for a table log
    fn latest(&self, table_path: &str) -> Result<Option<ExternalEntry>>;
}

// =============================================================================
// Shared in-memory state
// =============================================================================

/// Partitioned item storage shared by the table backends.
/// Callers serialize access; nothing here locks.
#[derive(Debug, Default)]
pub(crate) struct TableState {
    partitions: HashMap<String, BTreeMap<String, Item>>,
    hints: ThroughputHints,
}

impl TableState {
    pub(crate) fn new(hints: ThroughputHints) -> Self {
        Self {
            partitions: HashMap::new(),
            hints,
        }
    }

    pub(crate) fn hints(&self) -> ThroughputHints {
        self.hints
    }

    pub(crate) fn item(&self, key: &EntryKey) -> Option<&Item> {
        self.partitions
            .get(&key.table_path)
            .and_then(|p| p.get(&key.file_name))
    }

    pub(crate) fn insert(&mut self, key: EntryKey, item: Item) {
        self.partitions
            .entry(key.table_path)
            .or_default()
            .insert(key.file_name, item);
    }

    pub(crate) fn latest(&self, table_path: &str) -> Option<&Item> {
        self.partitions
            .get(table_path)
            .and_then(|p| p.values().next_back())
    }

    pub(crate) fn record_count(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }
}
