//! In-memory object store
//!
//! BTreeMap behind a RwLock. Can be configured to behave like a blob store
//! without create-if-absent, where `PutMode::Create` degrades to an unlocked
//! check followed by a blind write.

use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{LakeError, Result};

use super::{ObjectStore, PutMode, PutOutcome};

#[derive(Debug)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,

    /// Whether Create is evaluated atomically
    atomic_create: bool,
}

impl InMemoryObjectStore {
    /// Store with linearizable create-if-absent
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            atomic_create: true,
        }
    }

    /// Store that silently races on create-if-absent (S3-like)
    pub fn without_put_if_absent() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            atomic_create: false,
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get(&self, path: &str) -> Result<Option<Bytes>> {
        Ok(self.objects.read().get(path).cloned())
    }

    fn put(&self, path: &str, data: Bytes, mode: PutMode) -> Result<PutOutcome> {
        match mode {
            PutMode::Overwrite => {
                self.objects.write().insert(path.to_string(), data);
                Ok(PutOutcome::Written)
            }
            PutMode::Create if self.atomic_create => {
                let mut objects = self.objects.write();
                if objects.contains_key(path) {
                    return Ok(PutOutcome::AlreadyExists);
                }
                objects.insert(path.to_string(), data);
                Ok(PutOutcome::Written)
            }
            PutMode::Create => {
                // check and write under separate lock acquisitions
                if self.objects.read().contains_key(path) {
                    return Ok(PutOutcome::AlreadyExists);
                }
                self.objects.write().insert(path.to_string(), data);
                Ok(PutOutcome::Written)
            }
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(path))
    }

    fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut objects = self.objects.write();
        let data = objects
            .remove(from)
            .ok_or_else(|| LakeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no object at {from}"),
            )))?;
        objects.insert(to.to_string(), data);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().remove(path);
        Ok(())
    }

    fn supports_put_if_absent(&self) -> bool {
        self.atomic_create
    }
}
