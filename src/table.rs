//! Table Log
//!
//! Per-table transaction context: owns the client for one table's lifetime.
//!
//! ## Responsibilities
//! - Resolve the strategy name and build its client (fails before any I/O
//!   on unknown names or bad configuration)
//! - Bind the table to that strategy, rejecting a different one
//! - Register the table with the coordinator
//! - Forward commit / listing / backfill with the table path fixed

use std::sync::Arc;

use bytes::Bytes;

use crate::config::Conf;
use crate::coordinator::{
    bind_strategy, BackfillOutcome, BuilderRegistry, CommitCoordinatorClient, CommitIter,
    CommitVerdict,
};
use crate::error::Result;
use crate::logstore::{ResolvedEntry, Version};
use crate::object_store::ObjectStore;

#[derive(Debug)]
pub struct TableLog {
    /// Log root of the table
    table_path: String,

    /// Strategy name the table is bound to
    strategy: String,

    client: Arc<dyn CommitCoordinatorClient>,
}

impl TableLog {
    /// Open a table under `strategy`, registering it at version 0
    pub fn open(
        registry: &BuilderRegistry,
        store: &dyn ObjectStore,
        table_path: &str,
        strategy: &str,
        conf: &Conf,
    ) -> Result<Self> {
        Self::open_at(registry, store, table_path, strategy, conf, 0)
    }

    /// Open a table whose first coordinated version is `initial_version`
    pub fn open_at(
        registry: &BuilderRegistry,
        store: &dyn ObjectStore,
        table_path: &str,
        strategy: &str,
        conf: &Conf,
        initial_version: Version,
    ) -> Result<Self> {
        let client = registry.build(strategy, conf)?;

        bind_strategy(store, table_path, strategy)?;
        client.register_table(table_path, initial_version)?;

        tracing::debug!("opened table {} with coordinator {:?}", table_path, strategy);

        Ok(Self {
            table_path: table_path.to_string(),
            strategy: strategy.to_string(),
            client,
        })
    }

    pub fn commit(&self, version: Version, payload: Bytes) -> Result<CommitVerdict> {
        self.client.commit(&self.table_path, version, payload)
    }

    pub fn commits_from(&self, version: Version) -> Result<CommitIter<'_>> {
        self.client.get_commits(&self.table_path, version)
    }

    /// All committed entries from `version`, collected
    pub fn read_from(&self, version: Version) -> Result<Vec<ResolvedEntry>> {
        self.commits_from(version)?.collect()
    }

    pub fn backfill(&self, version: Version) -> Result<BackfillOutcome> {
        self.client.backfill(&self.table_path, version)
    }

    pub fn table_path(&self) -> &str {
        &self.table_path
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn client(&self) -> &Arc<dyn CommitCoordinatorClient> {
        &self.client
    }
}
