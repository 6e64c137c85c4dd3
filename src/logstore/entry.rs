//! Commit outcomes

use bytes::Bytes;

use crate::error::{LakeError, Result};

/// Log version number
pub type Version = u64;

/// Outcome of `LogStoreCoordinator::write_entry`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerdict {
    /// This writer's payload is the canonical entry
    Written,

    /// Another writer owns the version; resolve it to see what won
    LostRace,
}

impl WriteVerdict {
    /// Treat a lost race as `LakeError::RaceLost`
    pub fn written(self, table_path: &str, version: Version) -> Result<()> {
        match self {
            WriteVerdict::Written => Ok(()),
            WriteVerdict::LostRace => Err(LakeError::RaceLost {
                table_path: table_path.to_string(),
                version,
            }),
        }
    }
}

/// A committed, durably visible log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub version: Version,

    /// Object key of the canonical entry
    pub path: String,

    pub payload: Bytes,

    /// Commit time from the intent record, if one exists (diagnostics only)
    pub commit_time: Option<u64>,
}

/// Outcome of resolving a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Committed(ResolvedEntry),

    /// Nothing resolvable as complete; readers must not use this version
    NotCommitted,
}

impl Resolution {
    pub fn is_committed(&self) -> bool {
        matches!(self, Resolution::Committed(_))
    }

    pub fn committed(self) -> Option<ResolvedEntry> {
        match self {
            Resolution::Committed(entry) => Some(entry),
            Resolution::NotCommitted => None,
        }
    }
}
