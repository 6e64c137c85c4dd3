//! Commit Coordinator Module
//!
//! Pluggable commit strategies. A table's transaction layer talks to one
//! `CommitCoordinatorClient`; which implementation it gets is decided by a
//! strategy name resolved through the `BuilderRegistry`.
//!
//! ## Strategies
//! - `exclusion-table`: ordering derived from the exclusion table
//!   (wraps `LogStoreCoordinator`)
//! - `in-memory`: a reference coordination service that is itself the
//!   arbiter and backfills to the object store
//!
//! ## Lifecycle
//! ```text
//!   registry.resolve(name) ─► builder.build(conf) ─► client
//!                                                     │
//!          register_table ─► commit* ─► backfill* ─► get_commits*
//! ```

mod backfill;
mod binding;
mod builder;
mod exclusion;
mod memory;
mod registry;

use std::fmt;

use bytes::Bytes;

use crate::error::Result;
use crate::logstore::{ResolvedEntry, Version};

pub use backfill::{BackfillStats, BackfillWorker};
pub use binding::{bind_strategy, bound_strategy, BINDING_OBJECT};
pub use builder::{CommitCoordinatorBuilder, ExclusionCoordinatorBuilder, InMemoryCoordinatorBuilder};
pub use exclusion::ExclusionCommitClient;
pub use memory::InMemoryCommitCoordinator;
pub use registry::{global, BuilderRegistry};

/// Outcome of a coordinated commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitVerdict {
    Accepted,

    /// The version is taken; fetch the latest state before retrying
    Rejected { current_version: Option<Version> },
}

/// Outcome of a backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// The canonical object was written by this call
    Published,

    /// Identical content was already there
    AlreadyPresent,
}

/// Lazy sequence of committed entries
pub type CommitIter<'a> = Box<dyn Iterator<Item = Result<ResolvedEntry>> + Send + 'a>;

/// Capability set of a commit coordinator
///
/// Clients hold no per-table state of their own and are shared across
/// concurrent commits for many tables.
pub trait CommitCoordinatorClient: Send + Sync + fmt::Debug {
    /// Declare a table under this coordinator (idempotent)
    fn register_table(&self, table_path: &str, initial_version: Version) -> Result<()>;

    fn commit(&self, table_path: &str, version: Version, payload: Bytes) -> Result<CommitVerdict>;

    /// Committed entries from `from_version` upward, stopping at the first gap
    fn get_commits<'a>(&'a self, table_path: &str, from_version: Version) -> Result<CommitIter<'a>>;

    /// Copy a committed entry to its canonical object-store path.
    /// Safe to repeat; conflicting content is an `Inconsistency`.
    fn backfill(&self, table_path: &str, version: Version) -> Result<BackfillOutcome>;
}
