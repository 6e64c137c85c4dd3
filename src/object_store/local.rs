//! Local filesystem object store
//!
//! Maps keys onto files below a root directory. Overwrites go through a
//! sibling `.part` file plus `rename`, and create-if-absent uses `hard_link`,
//! which fails atomically when the target already exists.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{LakeError, Result};

use super::{ObjectStore, PutMode, PutOutcome};

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Directory all keys are resolved against
    root: PathBuf,
}

impl LocalObjectStore {
    /// Marker in the name of in-flight write files (never listed)
    const PART_MARKER: &'static str = ".part-";

    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a filesystem path, rejecting escapes from the root
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(LakeError::Config(format!("invalid object key {key:?}")));
        }
        Ok(self.root.join(relative))
    }

    /// Write `data` to a fresh sibling file of `target` and sync it
    fn write_part(target: &Path, data: &[u8]) -> Result<PathBuf> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = target.with_file_name(format!(".{name}{}{}", Self::PART_MARKER, Uuid::new_v4()));

        let mut file = OpenOptions::new().write(true).create_new(true).open(&part)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(part)
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, path: &str) -> Result<Option<Bytes>> {
        match fs::read(self.resolve(path)?) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, path: &str, data: Bytes, mode: PutMode) -> Result<PutOutcome> {
        let target = self.resolve(path)?;
        let part = Self::write_part(&target, &data)?;

        let outcome = match mode {
            PutMode::Overwrite => fs::rename(&part, &target).map(|_| PutOutcome::Written),
            PutMode::Create => {
                let linked = match fs::hard_link(&part, &target) {
                    Ok(()) => Ok(PutOutcome::Written),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyExists),
                    Err(e) => Err(e),
                };
                let _ = fs::remove_file(&part);
                linked
            }
        };

        if outcome.is_err() {
            let _ = fs::remove_file(&part);
        }
        Ok(outcome?)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        // "a/b/00001" -> directory "a/b", name prefix "00001"
        let (dir_key, name_prefix) = match prefix.rfind('/') {
            Some(i) => (&prefix[..i], &prefix[i + 1..]),
            None => ("", prefix),
        };
        let dir = if dir_key.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir_key)?
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(Self::PART_MARKER) || !name.starts_with(name_prefix) {
                continue;
            }
            keys.push(if dir_key.is_empty() {
                name
            } else {
                format!("{dir_key}/{name}")
            });
        }

        keys.sort();
        Ok(keys)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let target = self.resolve(to)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.resolve(from)?, target)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(path)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn supports_put_if_absent(&self) -> bool {
        true
    }
}
