//! Exclusion-table strategy
//!
//! Exposes `LogStoreCoordinator` through the coordinator client interface.

use bytes::Bytes;

use crate::config::ThroughputHints;
use crate::error::{LakeError, Result};
use crate::logstore::{LogStoreCoordinator, Resolution, Version, WriteVerdict};

use super::{BackfillOutcome, CommitCoordinatorClient, CommitIter, CommitVerdict};

#[derive(Debug, Clone)]
pub struct ExclusionCommitClient {
    log_store: LogStoreCoordinator,

    /// Used when `register_table` has to create the exclusion table
    hints: ThroughputHints,
}

impl ExclusionCommitClient {
    pub fn new(log_store: LogStoreCoordinator, hints: ThroughputHints) -> Self {
        Self { log_store, hints }
    }

    pub fn log_store(&self) -> &LogStoreCoordinator {
        &self.log_store
    }
}

impl CommitCoordinatorClient for ExclusionCommitClient {
    fn register_table(&self, table_path: &str, initial_version: Version) -> Result<()> {
        let status = self.log_store.ensure_table_exists(&self.hints)?;
        tracing::debug!(
            "registered {} at version {} (exclusion table {:?})",
            table_path,
            initial_version,
            status
        );
        Ok(())
    }

    fn commit(&self, table_path: &str, version: Version, payload: Bytes) -> Result<CommitVerdict> {
        match self.log_store.write_entry(table_path, version, payload)? {
            WriteVerdict::Written => Ok(CommitVerdict::Accepted),
            WriteVerdict::LostRace => Ok(CommitVerdict::Rejected {
                current_version: self.log_store.latest_version(table_path)?,
            }),
        }
    }

    fn get_commits<'a>(&'a self, table_path: &str, from_version: Version) -> Result<CommitIter<'a>> {
        Ok(Box::new(self.log_store.list_from(table_path, from_version)))
    }

    fn backfill(&self, table_path: &str, version: Version) -> Result<BackfillOutcome> {
        match self.log_store.resolve_inner(table_path, version)? {
            (Resolution::Committed(_), true) => Ok(BackfillOutcome::Published),
            (Resolution::Committed(_), false) => Ok(BackfillOutcome::AlreadyPresent),
            (Resolution::NotCommitted, _) => Err(LakeError::NotCommitted {
                table_path: table_path.to_string(),
                version,
            }),
        }
    }
}
