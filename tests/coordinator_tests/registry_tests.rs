//! Tests for BuilderRegistry and the coordinator builders
//!
//! These tests verify:
//! - Name resolution and unknown-name failures
//! - Builders validate configuration before any I/O
//! - Same configuration -> clients backed by the same state

use std::sync::Arc;

use bytes::Bytes;
use lakelog::coordinator::{
    global, BuilderRegistry, CommitCoordinatorBuilder, ExclusionCoordinatorBuilder,
    InMemoryCoordinatorBuilder,
};
use lakelog::object_store::{InMemoryObjectStore, ObjectStore};
use lakelog::{CommitVerdict, Conf, LakeError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn conf(pairs: &[(&str, &str)]) -> Conf {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn setup_registry() -> (Arc<dyn ObjectStore>, BuilderRegistry) {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let registry = BuilderRegistry::new();
    registry.register(Arc::new(ExclusionCoordinatorBuilder::in_memory(Arc::clone(&store))));
    registry.register(Arc::new(InMemoryCoordinatorBuilder::new(Arc::clone(&store))));
    (store, registry)
}

fn exclusion_conf(table: &str) -> Conf {
    conf(&[("lakelog.storage.ExclusionLogStore.ddb.tableName", table)])
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_names_sorted() {
    let (_store, registry) = setup_registry();
    assert_eq!(registry.names(), vec!["exclusion-table", "in-memory"]);
}

#[test]
fn test_unknown_strategy() {
    let (_store, registry) = setup_registry();

    assert!(matches!(
        registry.resolve("zookeeper"),
        Err(LakeError::UnknownStrategy(ref name)) if name == "zookeeper"
    ));
    assert!(matches!(
        registry.build("zookeeper", &Conf::new()),
        Err(LakeError::UnknownStrategy(_))
    ));
}

#[test]
fn test_resolve_returns_registered_builder() {
    let (_store, registry) = setup_registry();
    let builder = registry.resolve(InMemoryCoordinatorBuilder::NAME).unwrap();
    assert_eq!(builder.name(), "in-memory");
}

#[test]
fn test_register_replaces_same_name() {
    let (store, registry) = setup_registry();

    let previous = registry.register(Arc::new(InMemoryCoordinatorBuilder::new(store)));

    assert!(previous.is_some());
    assert_eq!(registry.names().len(), 2);
}

#[test]
fn test_global_registry_is_shared() {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    global().register(Arc::new(InMemoryCoordinatorBuilder::new(store)));

    assert!(global().names().contains(&"in-memory".to_string()));
    assert!(std::ptr::eq(global(), global()));
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_missing_table_name_fails_fast() {
    let (_store, registry) = setup_registry();

    let err = registry
        .build(ExclusionCoordinatorBuilder::NAME, &Conf::new())
        .unwrap_err();

    assert!(matches!(err, LakeError::Config(ref msg) if msg.contains("ddb.tableName")));
}

#[test]
fn test_invalid_batch_size_fails_fast() {
    let (_store, registry) = setup_registry();

    let err = registry
        .build(
            InMemoryCoordinatorBuilder::NAME,
            &conf(&[("InMemoryCommitCoordinator.backfillBatchSize", "0")]),
        )
        .unwrap_err();

    assert!(matches!(err, LakeError::Config(_)));
}

#[test]
fn test_build_does_no_io() {
    let dir = TempDir::new().unwrap();
    let journal_dir = dir.path().join("journals");
    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let builder = ExclusionCoordinatorBuilder::journaled(store, &journal_dir);

    builder.build(&exclusion_conf("delta_log")).unwrap();

    assert!(!journal_dir.exists());
}

// =============================================================================
// Determinism Tests
// =============================================================================

#[test]
fn test_exclusion_builds_share_table() {
    let (_store, registry) = setup_registry();
    let a = registry
        .build(ExclusionCoordinatorBuilder::NAME, &exclusion_conf("delta_log"))
        .unwrap();
    let b = registry
        .build(ExclusionCoordinatorBuilder::NAME, &exclusion_conf("delta_log"))
        .unwrap();

    a.register_table("t/_delta_log", 0).unwrap();
    assert_eq!(
        a.commit("t/_delta_log", 0, Bytes::from_static(b"a")).unwrap(),
        CommitVerdict::Accepted
    );
    assert_eq!(
        b.commit("t/_delta_log", 0, Bytes::from_static(b"b")).unwrap(),
        CommitVerdict::Rejected {
            current_version: Some(0)
        }
    );
}

#[test]
fn test_exclusion_builds_with_different_tables_are_independent() {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let builder = ExclusionCoordinatorBuilder::in_memory(store);

    let a = builder.build(&exclusion_conf("table_a")).unwrap();
    let b = builder.build(&exclusion_conf("table_b")).unwrap();
    a.register_table("t/_delta_log", 0).unwrap();

    // table_b was never created
    assert!(matches!(
        b.commit("t/_delta_log", 0, Bytes::from_static(b"b")),
        Err(LakeError::TableNotFound(ref name)) if name == "table_b"
    ));
}

#[test]
fn test_in_memory_builds_share_service() {
    let (_store, registry) = setup_registry();
    let conf = conf(&[("InMemoryCommitCoordinator.backfillBatchSize", "3")]);
    let a = registry.build(InMemoryCoordinatorBuilder::NAME, &conf).unwrap();
    let b = registry.build(InMemoryCoordinatorBuilder::NAME, &conf).unwrap();

    a.register_table("t/_delta_log", 0).unwrap();
    a.commit("t/_delta_log", 0, Bytes::from_static(b"v0")).unwrap();

    let seen: Vec<_> = b
        .get_commits("t/_delta_log", 0)
        .unwrap()
        .map(|e| e.unwrap().payload)
        .collect();
    assert_eq!(seen, vec![Bytes::from_static(b"v0")]);
}
