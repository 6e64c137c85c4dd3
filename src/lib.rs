//! # lakelog
//!
//! Commit atomicity for table transaction logs kept in object stores:
//! - At most one payload ever becomes the entry for a log version
//! - Works on stores without atomic create-if-absent
//! - Crash-tolerant two-phase intent records with self-healing recovery
//! - Pluggable commit coordinators resolved by name
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TableLog                            │
//! │              (one client per table lifetime)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  BuilderRegistry: name ─► builder ─► client
//!          ┌────────────┴─────────────┐
//!          │                          │
//!          ▼                          ▼
//!  ┌───────────────────┐     ┌──────────────────────┐
//!  │ExclusionCommit    │     │InMemoryCommit        │
//!  │Client             │     │Coordinator (service) │
//!  └────────┬──────────┘     └──────────┬───────────┘
//!           ▼                           │ backfill
//!  ┌───────────────────┐                │
//!  │LogStoreCoordinator│                │
//!  └───┬───────────┬───┘                │
//!      ▼           ▼                    ▼
//! ┌──────────┐ ┌─────────────────────────────────┐
//! │Exclusion │ │          ObjectStore            │
//! │Table     │ │ (payloads, canonical entries)   │
//! └──────────┘ └─────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod object_store;
pub mod exclusion;
pub mod logstore;
pub mod coordinator;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LakeError, Result};
pub use config::{Conf, ExclusionConfig, InMemoryCoordinatorConfig, ThroughputHints};
pub use logstore::{LogStoreCoordinator, Resolution, ResolvedEntry, Version, WriteVerdict};
pub use coordinator::{
    BackfillOutcome, BuilderRegistry, CommitCoordinatorBuilder, CommitCoordinatorClient,
    CommitVerdict,
};
pub use table::TableLog;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of lakelog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
