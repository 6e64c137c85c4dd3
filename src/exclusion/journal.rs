//! Journaled exclusion table
//!
//! Durable backend shared by every process on one host. Every accepted
//! mutation is appended to a journal as the full image of the record it
//! produced; the table is rebuilt by replaying the journal.
//!
//! ## Frame Format
//! ```text
//! ┌─────────┬─────────┬─────────┬──────────────────────┐
//! │ LSN (8) │ CRC (4) │ Len (4) │ bincode(JournalRecord)│
//! └─────────┴─────────┴─────────┴──────────────────────┘
//! ```
//! All integers little-endian; CRC32 covers the record bytes only.
//!
//! ## Concurrency
//! Every operation runs under an exclusive OS lock on the journal file. With
//! the lock held, frames appended by other handles since the last look are
//! replayed first, so conditions are always checked against the whole log.
//! A decision is only applied after its frame is synced, so a crash never
//! exposes a decision that did not reach disk.
//!
//! A torn or corrupt frame ends the log: it and everything after it is
//! truncated. Only a crashed writer can leave one, since frames are written
//! and synced under the lock.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ThroughputHints;
use crate::error::{LakeError, Result};

use super::{EntryKey, ExclusionTable, ExternalEntry, Item, TableState, TableStatus};

/// Frame header: LSN (8) + CRC (4) + Len (4)
const HEADER_SIZE: usize = 16;

/// Upper bound on a single record (guards against garbage lengths)
const MAX_RECORD_SIZE: usize = 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
enum JournalRecord {
    /// First frame of every journal
    Create { rcu: u64, wcu: u64 },

    /// Image of a record after an accepted write
    Put {
        table_path: String,
        file_name: String,
        item: Item,
    },
}

/// Outcome of replaying a journal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalRecovery {
    /// Frames applied from disk, including those appended by other handles
    pub frames_replayed: u64,

    /// LSN of the last good frame (0 for an empty journal)
    pub last_lsn: u64,

    /// Whether a torn / corrupt tail was cut off
    pub was_truncated: bool,
}

#[derive(Debug)]
struct Journal {
    path: PathBuf,
    file: File,

    /// Bytes of the journal already reflected in `state`
    len: u64,

    next_lsn: u64,

    /// Whether the `Create` frame has been seen
    created: bool,

    state: TableState,
    recovery: JournalRecovery,
}

impl Journal {
    fn new(path: &Path, file: File) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            len: 0,
            next_lsn: 1,
            created: false,
            state: TableState::default(),
            recovery: JournalRecovery::default(),
        }
    }

    /// Open an existing journal; frames are read on first locked access
    fn open_existing(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).append(true).open(path)?;
        Ok(Self::new(path, file))
    }

    /// Run `f` under the exclusive file lock, after catching up with the
    /// frames other handles appended
    fn locked<T>(&mut self, f: impl FnOnce(&mut Journal) -> Result<T>) -> Result<T> {
        FileExt::lock_exclusive(&self.file)?;
        let result = self.catch_up().and_then(|_| f(self));
        let unlocked = FileExt::unlock(&self.file);
        let value = result?;
        unlocked?;
        Ok(value)
    }

    /// Apply every complete frame past `len`; cut off a torn tail
    fn catch_up(&mut self) -> Result<()> {
        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.read_to_end(&mut buf)?;
        if buf.is_empty() {
            return Ok(());
        }

        let from_start = self.len == 0;
        let mut offset = 0usize;
        let mut applied = 0u64;

        while offset < buf.len() {
            let Some((lsn, record, frame_len)) = decode_frame(&buf[offset..]) else {
                break;
            };
            if lsn != self.next_lsn {
                tracing::warn!(
                    "exclusion journal {}: LSN jumps from {} to {}",
                    self.path.display(),
                    self.next_lsn - 1,
                    lsn
                );
                break;
            }
            self.apply(record);
            self.next_lsn += 1;
            offset += frame_len;
            applied += 1;
        }

        self.recovery.frames_replayed += applied;
        self.recovery.last_lsn = self.next_lsn - 1;

        if offset < buf.len() {
            tracing::warn!(
                "exclusion journal {}: truncating {} trailing bytes after LSN {}",
                self.path.display(),
                buf.len() - offset,
                self.recovery.last_lsn
            );
            self.file.set_len(self.len + offset as u64)?;
            self.file.sync_all()?;
            self.recovery.was_truncated = true;
        }
        self.len += offset as u64;

        if from_start {
            tracing::info!(
                "exclusion journal {} replayed: {} frames, last_lsn={}",
                self.path.display(),
                applied,
                self.recovery.last_lsn
            );
        } else if applied > 0 {
            tracing::debug!(
                "exclusion journal {}: caught up {} frames to LSN {}",
                self.path.display(),
                applied,
                self.recovery.last_lsn
            );
        }
        Ok(())
    }

    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::Create { rcu, wcu } => {
                self.state = TableState::new(ThroughputHints {
                    read_capacity_units: rcu,
                    write_capacity_units: wcu,
                });
                self.created = true;
            }
            JournalRecord::Put {
                table_path,
                file_name,
                item,
            } => self.state.insert(EntryKey::new(table_path, file_name), item),
        }
    }

    /// Append one record and sync it; on failure the file is cut back.
    /// Only called with the file lock held.
    fn append(&mut self, record: &JournalRecord) -> Result<()> {
        let data = bincode::serialize(record)?;
        let frame = encode_frame(self.next_lsn, &data);

        let written = self
            .file
            .write_all(&frame)
            .and_then(|_| self.file.sync_data());
        if let Err(e) = written {
            let _ = self.file.set_len(self.len);
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        self.recovery.last_lsn = self.next_lsn;
        self.next_lsn += 1;
        Ok(())
    }

    fn put(&mut self, key: EntryKey, item: Item) -> Result<()> {
        self.append(&JournalRecord::Put {
            table_path: key.table_path.clone(),
            file_name: key.file_name.clone(),
            item: item.clone(),
        })?;
        self.state.insert(key, item);
        Ok(())
    }
}

/// Exclusion table persisted as `<dir>/<name>.journal`
#[derive(Debug)]
pub struct JournalExclusionTable {
    name: String,
    path: PathBuf,
    journal: Mutex<Option<Journal>>,
}

impl JournalExclusionTable {
    pub const EXTENSION: &'static str = "journal";

    /// Handle to the table; nothing is read until first use
    pub fn open(dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = dir.join(format!("{name}.{}", Self::EXTENSION));
        Self {
            name,
            path,
            journal: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the journal if needed and report what replay found
    pub fn recover(&self) -> Result<JournalRecovery> {
        self.with_journal(|journal| Ok(journal.recovery))
    }

    pub fn record_count(&self) -> Result<usize> {
        self.with_journal(|journal| Ok(journal.state.record_count()))
    }

    fn with_journal<T>(&self, f: impl FnOnce(&mut Journal) -> Result<T>) -> Result<T> {
        let mut guard = self.journal.lock();
        if guard.is_none() {
            match Journal::open_existing(&self.path) {
                Ok(journal) => *guard = Some(journal),
                Err(LakeError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    return Err(LakeError::TableNotFound(self.name.clone()))
                }
                Err(e) => return Err(e),
            }
        }
        let Some(journal) = guard.as_mut() else {
            return Err(LakeError::TableNotFound(self.name.clone()));
        };
        journal.locked(|journal| {
            // the creator has not written its first frame yet
            if !journal.created {
                return Err(LakeError::TableNotFound(self.name.clone()));
            }
            f(journal)
        })
    }
}

impl ExclusionTable for JournalExclusionTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_table_exists(&self, hints: &ThroughputHints) -> Result<TableStatus> {
        let mut guard = self.journal.lock();
        if guard.is_some() {
            return Ok(TableStatus::AlreadyExists);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let created = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(&self.path);

        match created {
            Ok(file) => {
                let mut journal = Journal::new(&self.path, file);
                journal.locked(|journal| {
                    journal.append(&JournalRecord::Create {
                        rcu: hints.read_capacity_units,
                        wcu: hints.write_capacity_units,
                    })?;
                    journal.state = TableState::new(*hints);
                    journal.created = true;
                    Ok(())
                })?;
                *guard = Some(journal);
                tracing::info!("created exclusion journal {}", self.path.display());
                Ok(TableStatus::Created)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("exclusion journal {} already exists", self.path.display());
                let mut journal = Journal::open_existing(&self.path)?;
                journal.locked(|_| Ok(()))?;
                *guard = Some(journal);
                Ok(TableStatus::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put_if_absent(&self, entry: &ExternalEntry) -> Result<bool> {
        self.with_journal(|journal| {
            let key = entry.key();
            if journal.state.item(&key).is_some() {
                return Ok(false);
            }
            journal.put(key, entry.to_item())?;
            Ok(true)
        })
    }

    fn get(&self, key: &EntryKey) -> Result<Option<ExternalEntry>> {
        self.with_journal(|journal| {
            journal
                .state
                .item(key)
                .map(ExternalEntry::from_item)
                .transpose()
        })
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
        self.with_journal(|journal| {
            if journal.state.item(&key) != Some(&expected.to_item()) {
                return Ok(false);
            }
            journal.put(key, updated.to_item())?;
            Ok(true)
        })
    }

    fn latest(&self, table_path: &str) -> Result<Option<ExternalEntry>> {
        self.with_journal(|journal| {
            journal
                .state
                .latest(table_path)
                .map(ExternalEntry::from_item)
                .transpose()
        })
    }
}

// =============================================================================
// Framing / Replay
// =============================================================================

fn encode_frame(lsn: u64, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
    frame.extend_from_slice(&lsn.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
    frame.extend_from_slice(data);
    frame
}

/// Decode the frame at the start of `buf`: (lsn, record, frame length).
/// `None` means torn or corrupt.
fn decode_frame(buf: &[u8]) -> Option<(u64, JournalRecord, usize)> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    let lsn = u64::from_le_bytes(buf[0..8].try_into().ok()?);
    let crc = u32::from_le_bytes(buf[8..12].try_into().ok()?);
    let len = u32::from_le_bytes(buf[12..16].try_into().ok()?) as usize;

    if len > MAX_RECORD_SIZE || buf.len() < HEADER_SIZE + len {
        return None;
    }
    let data = &buf[HEADER_SIZE..HEADER_SIZE + len];
    if crc32fast::hash(data) != crc {
        return None;
    }
    let record = bincode::deserialize(data).ok()?;
    Some((lsn, record, HEADER_SIZE + len))
}
