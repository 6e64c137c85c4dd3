//! Strategy binding
//!
//! A table is bound to one coordinator name for its whole life. The name is
//! stored in a marker object under the log root, written create-if-absent.
//! Stores without an atomic create cannot decide a binding race, so binding
//! is refused on them.

use bytes::Bytes;

use crate::error::{LakeError, Result};
use crate::logstore::paths;
use crate::object_store::{ObjectStore, PutMode, PutOutcome};

/// Marker object name, relative to the log root
pub const BINDING_OBJECT: &str = "_commit_coordinator";

/// Strategy the table is bound to, if any
pub fn bound_strategy(store: &dyn ObjectStore, table_path: &str) -> Result<Option<String>> {
    let marker = paths::join(table_path, BINDING_OBJECT);
    Ok(store
        .get(&marker)?
        .map(|raw| String::from_utf8_lossy(&raw).trim().to_string()))
}

/// Bind `table_path` to `strategy`, or confirm an existing binding matches
pub fn bind_strategy(store: &dyn ObjectStore, table_path: &str, strategy: &str) -> Result<()> {
    let marker = paths::join(table_path, BINDING_OBJECT);

    if !store.supports_put_if_absent() {
        return Err(LakeError::Config(format!(
            "cannot bind {table_path} to {strategy:?}: object store has no atomic create"
        )));
    }

    if let PutOutcome::Written = store.put(
        &marker,
        Bytes::from(strategy.to_string()),
        PutMode::Create,
    )? {
        tracing::info!("bound {} to commit coordinator {:?}", table_path, strategy);
    }

    let bound = bound_strategy(store, table_path)?.ok_or_else(|| {
        LakeError::Transient(format!("binding marker {marker} not readable"))
    })?;

    if bound != strategy {
        return Err(LakeError::StrategyMismatch {
            table_path: table_path.to_string(),
            bound,
            requested: strategy.to_string(),
        });
    }
    Ok(())
}
