//! In-memory commit coordinator
//!
//! Reference coordination service: it alone decides which payload owns a
//! version, keeps accepted commits until they are backfilled, and trims
//! backfilled commits (except the newest, which anchors the next expected
//! version).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::InMemoryCoordinatorConfig;
use crate::error::{LakeError, Result};
use crate::logstore::{now_secs, paths, publish_canonical, PublishOutcome, ResolvedEntry, Version};
use crate::object_store::ObjectStore;

use super::{BackfillOutcome, CommitCoordinatorClient, CommitIter, CommitVerdict};

#[derive(Debug, Clone)]
struct TrackedCommit {
    payload: Bytes,
    commit_time: u64,
    backfilled: bool,
}

#[derive(Debug)]
struct TableCommits {
    initial_version: Version,
    latest: Option<Version>,
    commits: BTreeMap<Version, TrackedCommit>,
}

impl TableCommits {
    /// `None` once the version space is exhausted
    fn next_version(&self) -> Option<Version> {
        match self.latest {
            Some(v) => v.checked_add(1),
            None => Some(self.initial_version),
        }
    }

    fn pending_backfill(&self) -> Vec<Version> {
        self.commits
            .iter()
            .filter(|(_, c)| !c.backfilled)
            .map(|(v, _)| *v)
            .collect()
    }

    /// Drop backfilled commits older than the newest one
    fn trim(&mut self) {
        let Some(latest) = self.latest else { return };
        self.commits.retain(|v, c| !c.backfilled || *v == latest);
    }
}

#[derive(Debug)]
pub struct InMemoryCommitCoordinator {
    store: Arc<dyn ObjectStore>,
    config: InMemoryCoordinatorConfig,
    tables: Mutex<HashMap<String, TableCommits>>,
}

impl InMemoryCommitCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, config: InMemoryCoordinatorConfig) -> Self {
        Self {
            store,
            config,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> InMemoryCoordinatorConfig {
        self.config
    }

    /// Versions accepted but not yet backfilled
    pub fn unbackfilled(&self, table_path: &str) -> Vec<Version> {
        self.tables
            .lock()
            .get(table_path)
            .map(TableCommits::pending_backfill)
            .unwrap_or_default()
    }

    /// Versions the service still tracks (backfilled or not)
    pub fn tracked(&self, table_path: &str) -> Vec<Version> {
        self.tables
            .lock()
            .get(table_path)
            .map(|t| t.commits.keys().copied().collect())
            .unwrap_or_default()
    }

    fn not_registered(table_path: &str) -> LakeError {
        LakeError::TableNotRegistered(table_path.to_string())
    }
}

impl CommitCoordinatorClient for InMemoryCommitCoordinator {
    fn register_table(&self, table_path: &str, initial_version: Version) -> Result<()> {
        let mut tables = self.tables.lock();
        tables
            .entry(table_path.to_string())
            .or_insert_with(|| {
                tracing::info!("registered {} at version {}", table_path, initial_version);
                TableCommits {
                    initial_version,
                    latest: None,
                    commits: BTreeMap::new(),
                }
            });
        Ok(())
    }

    fn commit(&self, table_path: &str, version: Version, payload: Bytes) -> Result<CommitVerdict> {
        let to_backfill = {
            let mut tables = self.tables.lock();
            let table = tables
                .get_mut(table_path)
                .ok_or_else(|| Self::not_registered(table_path))?;

            let expected = table.next_version();
            if expected != Some(version) {
                tracing::debug!(
                    "{} version {} rejected, expected {:?}",
                    table_path,
                    version,
                    expected
                );
                return Ok(CommitVerdict::Rejected {
                    current_version: table.latest,
                });
            }

            table.commits.insert(
                version,
                TrackedCommit {
                    payload,
                    commit_time: now_secs(),
                    backfilled: false,
                },
            );
            table.latest = Some(version);

            let pending = table.pending_backfill();
            if pending.len() as u64 >= self.config.backfill_batch_size {
                pending
            } else {
                Vec::new()
            }
        };

        for v in to_backfill {
            // the commit already stands; backfill failures are retried later
            if let Err(e) = self.backfill(table_path, v) {
                tracing::error!("{} version {}: batch backfill failed: {}", table_path, v, e);
            }
        }

        Ok(CommitVerdict::Accepted)
    }

    fn get_commits<'a>(&'a self, table_path: &str, from_version: Version) -> Result<CommitIter<'a>> {
        let (latest, tracked) = {
            let tables = self.tables.lock();
            let table = tables
                .get(table_path)
                .ok_or_else(|| Self::not_registered(table_path))?;
            let tracked: BTreeMap<Version, TrackedCommit> = table
                .commits
                .range(from_version..)
                .map(|(v, c)| (*v, c.clone()))
                .collect();
            (table.latest, tracked)
        };

        Ok(Box::new(CoordinatedCommits {
            store: self.store.as_ref(),
            table_path: table_path.to_string(),
            next: Some(from_version),
            latest,
            tracked,
        }))
    }

    fn backfill(&self, table_path: &str, version: Version) -> Result<BackfillOutcome> {
        let canonical = paths::canonical_path(table_path, version);

        let payload = {
            let tables = self.tables.lock();
            let table = tables
                .get(table_path)
                .ok_or_else(|| Self::not_registered(table_path))?;
            table.commits.get(&version).map(|c| c.payload.clone())
        };

        let Some(payload) = payload else {
            // trimmed commits were backfilled before they were dropped
            return if self.store.exists(&canonical)? {
                Ok(BackfillOutcome::AlreadyPresent)
            } else {
                Err(LakeError::NotCommitted {
                    table_path: table_path.to_string(),
                    version,
                })
            };
        };

        let outcome =
            publish_canonical(self.store.as_ref(), table_path, version, &canonical, &payload)?;

        let mut tables = self.tables.lock();
        if let Some(table) = tables.get_mut(table_path) {
            if let Some(commit) = table.commits.get_mut(&version) {
                commit.backfilled = true;
            }
            table.trim();
        }

        tracing::debug!("{} version {} backfilled ({:?})", table_path, version, outcome);
        Ok(match outcome {
            PublishOutcome::AlreadyPresent => BackfillOutcome::AlreadyPresent,
            PublishOutcome::Published | PublishOutcome::Repaired => BackfillOutcome::Published,
        })
    }
}

/// Tracked commits first, backfilled ones from the object store
struct CoordinatedCommits<'a> {
    store: &'a dyn ObjectStore,
    table_path: String,
    next: Option<Version>,
    latest: Option<Version>,
    tracked: BTreeMap<Version, TrackedCommit>,
}

impl Iterator for CoordinatedCommits<'_> {
    type Item = Result<ResolvedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let version = self.next.take()?;
        if self.latest.map_or(true, |latest| version > latest) {
            return None;
        }

        let path = paths::canonical_path(&self.table_path, version);
        let entry = match self.tracked.remove(&version) {
            Some(commit) => ResolvedEntry {
                version,
                path,
                payload: commit.payload,
                commit_time: Some(commit.commit_time),
            },
            None => match self.store.get(&path) {
                Ok(Some(payload)) => ResolvedEntry {
                    version,
                    path,
                    payload,
                    commit_time: None,
                },
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            },
        };

        self.next = version.checked_add(1);
        Some(Ok(entry))
    }
}
