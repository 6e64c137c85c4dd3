//! In-memory exclusion table
//!
//! Linearizable within the process: every operation runs under one mutex.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::ThroughputHints;
use crate::error::{LakeError, Result};

use super::{EntryKey, ExclusionTable, ExternalEntry, TableState, TableStatus};

#[derive(Debug)]
pub struct MemoryExclusionTable {
    name: String,

    /// None until the table is created
    state: Mutex<Option<TableState>>,

    /// How many times creation actually happened (should never exceed 1)
    creations: AtomicU64,
}

impl MemoryExclusionTable {
    /// Handle to a table that does not exist yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(None),
            creations: AtomicU64::new(0),
        }
    }

    /// Handle to an already-created table
    pub fn created(name: impl Into<String>) -> Self {
        let table = Self::new(name);
        *table.state.lock() = Some(TableState::default());
        table
    }

    pub fn creation_count(&self) -> u64 {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().as_ref().map_or(0, TableState::record_count)
    }

    /// Hints the table was created with
    pub fn throughput(&self) -> Option<ThroughputHints> {
        self.state.lock().as_ref().map(TableState::hints)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TableState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(LakeError::TableNotFound(self.name.clone())),
        }
    }
}

impl ExclusionTable for MemoryExclusionTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_table_exists(&self, hints: &ThroughputHints) -> Result<TableStatus> {
        let mut guard = self.state.lock();
        if guard.is_some() {
            return Ok(TableStatus::AlreadyExists);
        }
        *guard = Some(TableState::new(*hints));
        self.creations.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "created exclusion table {} (rcu={}, wcu={})",
            self.name,
            hints.read_capacity_units,
            hints.write_capacity_units
        );
        Ok(TableStatus::Created)
    }

    fn put_if_absent(&self, entry: &ExternalEntry) -> Result<bool> {
        self.with_state(|state| {
            let key = entry.key();
            if state.item(&key).is_some() {
                return Ok(false);
            }
            state.insert(key, entry.to_item());
            Ok(true)
        })
    }

    fn get(&self, key: &EntryKey) -> Result<Option<ExternalEntry>> {
        self.with_state(|state| state.item(key).map(ExternalEntry::from_item).transpose())
    }

    fn compare_and_set(&self, expected: &ExternalEntry, updated: &ExternalEntry) -> Result<bool> {
        let key = expected.key();
        if updated.key() != key {
            return Err(LakeError::Config(format!(
                "compare_and_set cannot move {:?} to {:?}",
                key,
                updated.key()
            )));
        }
        self.with_state(|state| {
            if state.item(&key) != Some(&expected.to_item()) {
                return Ok(false);
            }
            state.insert(key, updated.to_item());
            Ok(true)
        })
    }

    fn latest(&self, table_path: &str) -> Result<Option<ExternalEntry>> {
        self.with_state(|state| {
            state
                .latest(table_path)
                .map(ExternalEntry::from_item)
                .transpose()
        })
    }
}
