//! Coordinator builders
//!
//! A builder turns a configuration map into a client. Builders never do
//! I/O: `build` only validates configuration, so a missing key is reported
//! before anything touches the network or disk. Building twice from the
//! same configuration yields clients backed by the same state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{Conf, ExclusionConfig, InMemoryCoordinatorConfig};
use crate::error::Result;
use crate::exclusion::{ExclusionTable, JournalExclusionTable, MemoryExclusionTable};
use crate::logstore::LogStoreCoordinator;
use crate::object_store::ObjectStore;

use super::{CommitCoordinatorClient, ExclusionCommitClient, InMemoryCommitCoordinator};

/// Factory for commit coordinator clients
pub trait CommitCoordinatorBuilder: Send + Sync {
    /// Registry key; must not do any I/O
    fn name(&self) -> &str;

    /// Build a client from configuration, failing fast on missing keys
    fn build(&self, conf: &Conf) -> Result<Arc<dyn CommitCoordinatorClient>>;
}

// =============================================================================
// Exclusion table strategy
// =============================================================================

type TableFactory = Box<dyn Fn(&str) -> Arc<dyn ExclusionTable> + Send + Sync>;

/// Builds `ExclusionCommitClient`s; one exclusion table handle per table name
pub struct ExclusionCoordinatorBuilder {
    store: Arc<dyn ObjectStore>,
    factory: TableFactory,
    tables: Mutex<HashMap<String, Arc<dyn ExclusionTable>>>,
}

impl ExclusionCoordinatorBuilder {
    pub const NAME: &'static str = "exclusion-table";

    /// Builder with a custom table factory (called once per table name)
    pub fn new(
        store: Arc<dyn ObjectStore>,
        factory: impl Fn(&str) -> Arc<dyn ExclusionTable> + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            factory: Box::new(factory),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Process-local exclusion tables
    pub fn in_memory(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, |name| {
            Arc::new(MemoryExclusionTable::new(name)) as Arc<dyn ExclusionTable>
        })
    }

    /// Journaled exclusion tables under `dir`
    pub fn journaled(store: Arc<dyn ObjectStore>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::new(store, move |name| {
            Arc::new(JournalExclusionTable::open(&dir, name)) as Arc<dyn ExclusionTable>
        })
    }

    fn table(&self, name: &str) -> Arc<dyn ExclusionTable> {
        let mut tables = self.tables.lock();
        Arc::clone(
            tables
                .entry(name.to_string())
                .or_insert_with(|| (self.factory)(name)),
        )
    }
}

impl CommitCoordinatorBuilder for ExclusionCoordinatorBuilder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build(&self, conf: &Conf) -> Result<Arc<dyn CommitCoordinatorClient>> {
        let config = ExclusionConfig::from_conf(conf)?;
        tracing::debug!(
            "building exclusion client: table={} region={} endpoint={:?}",
            config.table_name,
            config.region,
            config.endpoint
        );

        let table = self.table(&config.table_name);
        let log_store = LogStoreCoordinator::from_config(Arc::clone(&self.store), table, &config);
        Ok(Arc::new(ExclusionCommitClient::new(log_store, config.throughput)))
    }
}

// =============================================================================
// In-memory service strategy
// =============================================================================

/// Builds `InMemoryCommitCoordinator`s, one service per distinct configuration
pub struct InMemoryCoordinatorBuilder {
    store: Arc<dyn ObjectStore>,
    services: Mutex<HashMap<InMemoryCoordinatorConfig, Arc<InMemoryCommitCoordinator>>>,
}

impl InMemoryCoordinatorBuilder {
    pub const NAME: &'static str = "in-memory";

    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            services: Mutex::new(HashMap::new()),
        }
    }
}

impl CommitCoordinatorBuilder for InMemoryCoordinatorBuilder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build(&self, conf: &Conf) -> Result<Arc<dyn CommitCoordinatorClient>> {
        let config = InMemoryCoordinatorConfig::from_conf(conf)?;
        let mut services = self.services.lock();
        let service = services.entry(config).or_insert_with(|| {
            Arc::new(InMemoryCommitCoordinator::new(Arc::clone(&self.store), config))
        });
        Ok(Arc::clone(service) as Arc<dyn CommitCoordinatorClient>)
    }
}
