//! Log Store Module
//!
//! Turns an object store without reliable create-if-absent into one with
//! exactly-once, strictly ordered log entry publication.
//!
//! ## State Machine (per table, version)
//! ```text
//!   Unattempted ──put_if_absent──► Pending ──publish + CAS──► Committed
//!        │                            │
//!        └──put_if_absent fails──► LostRace (this attempt only)
//! ```
//!
//! ## Recovery Rules (`resolve_version`)
//! | Record     | Temp object | Canonical | Result                                   |
//! |------------|-------------|-----------|------------------------------------------|
//! | complete   | any         | present   | Committed (fast path)                    |
//! | complete   | any         | missing   | Inconsistency                            |
//! | pending    | present     | any       | publish temp, mark complete, Committed   |
//! | pending    | missing     | present   | mark complete, Committed                 |
//! | pending    | missing     | missing   | NotCommitted                             |
//! | missing    | -           | present   | restore record, Committed                |
//! | missing    | -           | missing   | NotCommitted                             |

mod coordinator;
mod entry;
pub mod paths;
mod publish;

pub use coordinator::{LogEntries, LogStoreCoordinator};
pub use entry::{Resolution, ResolvedEntry, Version, WriteVerdict};
pub use publish::{publish_canonical, PublishOutcome};

pub(crate) use coordinator::now_secs;
