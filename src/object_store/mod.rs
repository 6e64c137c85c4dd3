//! Object Store Module
//!
//! Thin capability over the blob store holding log payloads.
//!
//! ## Responsibilities
//! - Read / write whole objects addressed by `/`-separated keys
//! - Create-if-absent where the backing store can do it atomically
//! - Prefix listing, rename, delete
//!
//! ## Trust Model
//! Creating a *new, uniquely named* object is assumed reliable on every
//! store. Create-if-absent on a shared name is only trusted when
//! `supports_put_if_absent()` is true; otherwise it is a best-effort
//! check-then-write and the exclusion table decides races instead.

mod local;
mod memory;

use bytes::Bytes;
use std::fmt;

use crate::error::Result;

pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;

/// How a put treats an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Replace whatever is there
    Overwrite,

    /// Only write if nothing exists at the path
    Create,
}

/// Outcome of a put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    AlreadyExists,
}

/// Storage backend for log payloads
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Read a whole object, `None` if absent
    fn get(&self, path: &str) -> Result<Option<Bytes>>;

    /// Write a whole object
    fn put(&self, path: &str, data: Bytes, mode: PutMode) -> Result<PutOutcome>;

    /// Check for existence without reading content
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.get(path)?.is_some())
    }

    /// List keys beginning with `prefix`, sorted ascending
    fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Move an object to a new key (may not be atomic)
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Remove an object; absent objects are not an error
    fn delete(&self, path: &str) -> Result<()>;

    /// Whether `PutMode::Create` is linearizable on this store
    fn supports_put_if_absent(&self) -> bool;
}
