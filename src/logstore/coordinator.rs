//! Log Store Coordinator
//!
//! Exactly-once publication of log entries on an object store, with the
//! exclusion table as the race oracle.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::config::{ExclusionConfig, ThroughputHints};
use crate::error::{LakeError, Result};
use crate::exclusion::{EntryKey, ExclusionTable, ExternalEntry, TableStatus};
use crate::object_store::{ObjectStore, PutMode, PutOutcome};

use super::paths;
use super::publish::{publish_canonical, PublishOutcome};
use super::{Resolution, ResolvedEntry, Version, WriteVerdict};

/// Publishes and resolves log entries for any number of tables
///
/// ## Write protocol (per table, version)
/// 1. Payload -> fresh temp object `.tmp/<file>.<uuid>`
/// 2. `put_if_absent` of a pending intent record -> decides the winner
/// 3. Winner publishes the payload at the canonical path
/// 4. Winner flips the record to complete (best-effort)
///
/// ## Concurrency
/// - Holds no locks of its own; all `&self`
/// - Attempts on different versions never wait on each other
/// - Attempts on the same version are ordered only by the exclusion table
#[derive(Debug, Clone)]
pub struct LogStoreCoordinator {
    /// Payload storage (never trusted to resolve races)
    store: Arc<dyn ObjectStore>,

    /// Race oracle
    table: Arc<dyn ExclusionTable>,

    /// Retention stamped on completed records
    ttl_secs: u64,
}

impl LogStoreCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, table: Arc<dyn ExclusionTable>) -> Self {
        Self {
            store,
            table,
            ttl_secs: ExclusionConfig::DEFAULT_TTL_SECS,
        }
    }

    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        table: Arc<dyn ExclusionTable>,
        config: &ExclusionConfig,
    ) -> Self {
        Self::new(store, table).with_ttl_secs(config.ttl_secs)
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn table(&self) -> &Arc<dyn ExclusionTable> {
        &self.table
    }

    /// Idempotent table setup; safe to race with other first-time writers
    pub fn ensure_table_exists(&self, hints: &ThroughputHints) -> Result<TableStatus> {
        self.table.ensure_table_exists(hints)
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Try to make `payload` the canonical entry for `version`.
    ///
    /// `LostRace` means another attempt owns the version; call
    /// `resolve_version` to learn what won. An `Err` returned after the
    /// intent record was written does not mean this attempt lost either:
    /// only `resolve_version` can tell.
    pub fn write_entry(
        &self,
        table_path: &str,
        version: Version,
        payload: Bytes,
    ) -> Result<WriteVerdict> {
        let file_name = paths::file_name(version);
        let canonical = paths::join(table_path, &file_name);

        // Finish a stalled predecessor before claiming this version
        if version > 0 {
            let prev_key = EntryKey::new(table_path, paths::file_name(version - 1));
            if let Some(prev) = self.table.get(&prev_key)? {
                if !prev.complete {
                    tracing::debug!(
                        "{} version {}: predecessor pending, recovering first",
                        table_path,
                        version - 1
                    );
                    self.recover_pending(table_path, version - 1, prev)?;
                }
            }
        }

        if self.store.exists(&canonical)? {
            tracing::debug!("{} version {}: canonical entry already exists", table_path, version);
            return Ok(WriteVerdict::LostRace);
        }

        // Step 1: candidate payload under a unique name
        let temp_path = paths::new_temp_path(version);
        let temp_key = paths::join(table_path, &temp_path);
        if let PutOutcome::AlreadyExists =
            self.store.put(&temp_key, payload.clone(), PutMode::Create)?
        {
            return Err(LakeError::Transient(format!("temp object {temp_key} already exists")));
        }

        // Step 2: the one conditional write that picks the winner
        let entry = ExternalEntry::pending(table_path, &file_name, &temp_path, now_secs());
        if !self.table.put_if_absent(&entry)? {
            tracing::debug!("{} version {}: lost race", table_path, version);
            if let Err(e) = self.store.delete(&temp_key) {
                tracing::warn!("failed to remove losing temp object {}: {}", temp_key, e);
            }
            return Ok(WriteVerdict::LostRace);
        }

        // Step 3: publish
        publish_canonical(self.store.as_ref(), table_path, version, &canonical, &payload)?;

        // Step 4: finalize intent (recovery covers a failure here)
        self.mark_complete(&entry);

        tracing::debug!("{} version {}: committed", table_path, version);
        Ok(WriteVerdict::Written)
    }

    // =========================================================================
    // Read path / recovery
    // =========================================================================

    /// Decide whether `version` is committed, repairing stalled attempts.
    pub fn resolve_version(&self, table_path: &str, version: Version) -> Result<Resolution> {
        self.resolve_inner(table_path, version)
            .map(|(resolution, _)| resolution)
    }

    /// Resolve and report whether this call wrote the canonical object
    pub(crate) fn resolve_inner(
        &self,
        table_path: &str,
        version: Version,
    ) -> Result<(Resolution, bool)> {
        let file_name = paths::file_name(version);
        let canonical = paths::join(table_path, &file_name);

        match self.table.get(&EntryKey::new(table_path, &file_name))? {
            // Fast path: complete records are trusted
            Some(entry) if entry.complete => {
                let payload = self.store.get(&canonical)?.ok_or_else(|| {
                    LakeError::Inconsistency {
                        table_path: table_path.to_string(),
                        version,
                        expected: "canonical object (record is complete)".to_string(),
                        actual: "no object".to_string(),
                    }
                })?;
                Ok((
                    Resolution::Committed(ResolvedEntry {
                        version,
                        path: canonical,
                        payload,
                        commit_time: Some(entry.commit_time),
                    }),
                    false,
                ))
            }
            Some(entry) => self.recover_pending(table_path, version, entry),
            None => match self.store.get(&canonical)? {
                Some(payload) => {
                    // canonical object is authoritative; restore the record
                    let now = now_secs();
                    let repaired = ExternalEntry::pending(table_path, &file_name, &file_name, now)
                        .as_complete(now, self.ttl_secs);
                    match self.table.put_if_absent(&repaired) {
                        Ok(true) => tracing::info!(
                            "{} version {}: restored missing intent record",
                            table_path,
                            version
                        ),
                        Ok(false) => {}
                        Err(e) => tracing::warn!(
                            "{} version {}: could not restore intent record: {}",
                            table_path,
                            version,
                            e
                        ),
                    }
                    Ok((
                        Resolution::Committed(ResolvedEntry {
                            version,
                            path: canonical,
                            payload,
                            commit_time: None,
                        }),
                        false,
                    ))
                }
                None => Ok((Resolution::NotCommitted, false)),
            },
        }
    }

    /// Roll a pending record forward if its payload survives
    fn recover_pending(
        &self,
        table_path: &str,
        version: Version,
        entry: ExternalEntry,
    ) -> Result<(Resolution, bool)> {
        let canonical = paths::canonical_path(table_path, version);
        let temp_key = paths::join(table_path, &entry.temp_path);

        let (payload, published) = match self.store.get(&temp_key)? {
            Some(payload) => {
                let outcome = publish_canonical(
                    self.store.as_ref(),
                    table_path,
                    version,
                    &canonical,
                    &payload,
                )?;
                if outcome != PublishOutcome::AlreadyPresent {
                    tracing::info!(
                        "{} version {}: rolled pending commit forward ({:?})",
                        table_path,
                        version,
                        outcome
                    );
                }
                (payload, outcome != PublishOutcome::AlreadyPresent)
            }
            None => match self.store.get(&canonical)? {
                Some(payload) => {
                    tracing::warn!(
                        "{} version {}: temp object {} missing, trusting canonical entry",
                        table_path,
                        version,
                        entry.temp_path
                    );
                    (payload, false)
                }
                None => {
                    tracing::warn!(
                        "{} version {}: pending record has no surviving payload",
                        table_path,
                        version
                    );
                    return Ok((Resolution::NotCommitted, false));
                }
            },
        };

        self.mark_complete(&entry);

        Ok((
            Resolution::Committed(ResolvedEntry {
                version,
                path: canonical,
                payload,
                commit_time: Some(entry.commit_time),
            }),
            published,
        ))
    }

    /// pending -> complete; failures are left for recovery
    fn mark_complete(&self, entry: &ExternalEntry) {
        let updated = entry.as_complete(now_secs(), self.ttl_secs);
        match self.table.compare_and_set(entry, &updated) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                "{}/{}: intent record already finalized",
                entry.table_path,
                entry.file_name
            ),
            Err(e) => tracing::warn!(
                "{}/{}: failed to mark intent record complete: {}",
                entry.table_path,
                entry.file_name,
                e
            ),
        }
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Committed entries from `version` upward, stopping at the first gap
    pub fn list_from(&self, table_path: &str, version: Version) -> LogEntries<'_> {
        LogEntries {
            coordinator: self,
            table_path: table_path.to_string(),
            next: Some(version),
        }
    }

    /// Highest committed version, after finishing the newest pending record
    pub fn latest_version(&self, table_path: &str) -> Result<Option<Version>> {
        if let Some(latest) = self.table.latest(table_path)? {
            if !latest.complete {
                if let Some(version) = paths::parse_version(&latest.file_name) {
                    self.resolve_version(table_path, version)?;
                }
            }
        }

        let prefix = paths::join(table_path, "");
        Ok(self
            .store
            .list_with_prefix(&prefix)?
            .iter()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter_map(paths::parse_version)
            .max())
    }
}

/// Lazy, restartable iterator over committed entries
pub struct LogEntries<'a> {
    coordinator: &'a LogStoreCoordinator,
    table_path: String,
    next: Option<Version>,
}

impl Iterator for LogEntries<'_> {
    type Item = Result<ResolvedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let version = self.next.take()?;
        match self.coordinator.resolve_version(&self.table_path, version) {
            Ok(Resolution::Committed(entry)) => {
                self.next = version.checked_add(1);
                Some(Ok(entry))
            }
            Ok(Resolution::NotCommitted) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
