//! Canonical publish
//!
//! Makes a decided payload visible at its canonical path. Used by the
//! winning writer, by recovery, and by coordinator backfill. Publishing the
//! same bytes again is a no-op; different bytes are never overwritten.

use bytes::Bytes;

use crate::error::{ContentDigest, LakeError, Result};
use crate::object_store::{ObjectStore, PutMode, PutOutcome};

use super::Version;

/// What publishing did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The canonical object was written by this call
    Published,

    /// Identical content was already there
    AlreadyPresent,

    /// A truncated copy of the payload was found and rewritten
    Repaired,
}

/// Write `payload` at `path` unless it is already there.
///
/// An existing object that is a strict prefix of `payload` is treated as a
/// torn copy and rewritten. Any other difference is an `Inconsistency`.
pub fn publish_canonical(
    store: &dyn ObjectStore,
    table_path: &str,
    version: Version,
    path: &str,
    payload: &Bytes,
) -> Result<PublishOutcome> {
    if let PutOutcome::Written = store.put(path, payload.clone(), PutMode::Create)? {
        if !store.supports_put_if_absent() {
            // a blind write may have raced another; read it back
            verify_content(store, table_path, version, path, payload)?;
        }
        return Ok(PublishOutcome::Published);
    }

    let existing = store.get(path)?.ok_or_else(|| {
        LakeError::Transient(format!("{path} reported present but could not be read"))
    })?;

    if existing == *payload {
        return Ok(PublishOutcome::AlreadyPresent);
    }

    if existing.len() < payload.len() && payload.starts_with(&existing) {
        tracing::warn!(
            "{} version {}: canonical object is a truncated copy ({} of {} bytes), rewriting",
            table_path,
            version,
            existing.len(),
            payload.len()
        );
        store.put(path, payload.clone(), PutMode::Overwrite)?;
        verify_content(store, table_path, version, path, payload)?;
        return Ok(PublishOutcome::Repaired);
    }

    Err(mismatch(table_path, version, payload, &existing))
}

fn verify_content(
    store: &dyn ObjectStore,
    table_path: &str,
    version: Version,
    path: &str,
    payload: &Bytes,
) -> Result<()> {
    match store.get(path)? {
        Some(actual) if actual == *payload => Ok(()),
        Some(actual) => Err(mismatch(table_path, version, payload, &actual)),
        None => Err(LakeError::Transient(format!(
            "{path} not readable after publish"
        ))),
    }
}

fn mismatch(table_path: &str, version: Version, expected: &[u8], actual: &[u8]) -> LakeError {
    let err = LakeError::Inconsistency {
        table_path: table_path.to_string(),
        version,
        expected: ContentDigest::of(expected).to_string(),
        actual: ContentDigest::of(actual).to_string(),
    };
    tracing::error!("{}", err);
    err
}
