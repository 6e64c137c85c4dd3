//! Error types for lakelog
//!
//! One error type for every operation. The variants follow the commit
//! protocol's failure taxonomy:
//!
//! | Class              | Variants                                   | Recoverable |
//! |--------------------|--------------------------------------------|-------------|
//! | RaceLost           | `RaceLost`                                 | yes         |
//! | TransientIO        | `Io`, `Transient`, `TableNotFound`         | yes (caller retries) |
//! | Inconsistency      | `Inconsistency`                            | never       |
//! | ConfigurationError | `Config`, `StrategyMismatch`               | no          |
//! | UnknownStrategy    | `UnknownStrategy`                          | no          |

use std::fmt;

use thiserror::Error;

/// Result type alias using LakeError
pub type Result<T> = std::result::Result<T, LakeError>;

/// Unified error type for lakelog operations
#[derive(Debug, Error)]
pub enum LakeError {
    // -------------------------------------------------------------------------
    // Race outcomes
    // -------------------------------------------------------------------------
    #[error("lost commit race for {table_path} version {version}")]
    RaceLost { table_path: String, version: u64 },

    // -------------------------------------------------------------------------
    // Transient I/O
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Exclusion table not found: {0}")]
    TableNotFound(String),

    // -------------------------------------------------------------------------
    // Protocol violations
    // -------------------------------------------------------------------------
    #[error(
        "inconsistent log entry for {table_path} version {version}: expected {expected}, found {actual}"
    )]
    Inconsistency {
        table_path: String,
        version: u64,
        expected: String,
        actual: String,
    },

    #[error("{table_path} version {version} is not committed")]
    NotCommitted { table_path: String, version: u64 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration / strategy Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("unknown commit coordinator: {0}")]
    UnknownStrategy(String),

    #[error("table {table_path} is bound to coordinator {bound:?}, refusing {requested:?}")]
    StrategyMismatch {
        table_path: String,
        bound: String,
        requested: String,
    },

    #[error("table {0} is not registered with the commit coordinator")]
    TableNotRegistered(String),
}

impl LakeError {
    /// Whether the caller may retry the operation (possibly at a higher version).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LakeError::RaceLost { .. }
                | LakeError::Io(_)
                | LakeError::Transient(_)
                | LakeError::TableNotFound(_)
        )
    }

    /// Whether this error means the log's single-winner guarantee was broken.
    pub fn is_fatal_inconsistency(&self) -> bool {
        matches!(self, LakeError::Inconsistency { .. })
    }
}

impl From<bincode::Error> for LakeError {
    fn from(e: bincode::Error) -> Self {
        LakeError::Serialization(e.to_string())
    }
}

/// Compact fingerprint of a payload, used in inconsistency reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest {
    pub len: usize,
    pub crc32: u32,
}

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len(),
            crc32: crc32fast::hash(bytes),
        }
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes (crc32 {:08x})", self.len, self.crc32)
    }
}
