//! Exclusion record layout
//!
//! Persisted records are attribute maps so that any version of this crate
//! (or a reader written in another language) interprets them identically:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬────────────────────────┐
//! │ Attribute    │ Type                         │ Role                   │
//! ├──────────────┼──────────────────────────────┼────────────────────────┤
//! │ tablePath    │ S                            │ partition key          │
//! │ fileName     │ S                            │ sort key               │
//! │ tempPath     │ S (relative to log root)     │                        │
//! │ complete     │ S ("true" / "false")         │                        │
//! │ commitTime   │ N (epoch seconds)            │ diagnostics only       │
//! │ expireTime   │ N (epoch seconds, optional)  │ TTL, complete only     │
//! └──────────────┴──────────────────────────────┴────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LakeError, Result};

/// A single typed attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    S(String),

    /// Number, kept in its decimal string form
    N(String),
}

/// One stored record
pub type Item = BTreeMap<String, AttributeValue>;

pub const ATTR_TABLE_PATH: &str = "tablePath";
pub const ATTR_FILE_NAME: &str = "fileName";
pub const ATTR_TEMP_PATH: &str = "tempPath";
pub const ATTR_COMPLETE: &str = "complete";
pub const ATTR_COMMIT_TIME: &str = "commitTime";
pub const ATTR_EXPIRE_TIME: &str = "expireTime";

/// Primary key of a record: (table log root, canonical file name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub table_path: String,
    pub file_name: String,
}

impl EntryKey {
    pub fn new(table_path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            table_path: table_path.into(),
            file_name: file_name.into(),
        }
    }
}

/// Intent record for one (table, version) commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEntry {
    pub table_path: String,
    pub file_name: String,
    pub temp_path: String,
    pub complete: bool,
    pub commit_time: u64,
    pub expire_time: Option<u64>,
}

impl ExternalEntry {
    /// A not-yet-published attempt
    pub fn pending(
        table_path: impl Into<String>,
        file_name: impl Into<String>,
        temp_path: impl Into<String>,
        commit_time: u64,
    ) -> Self {
        Self {
            table_path: table_path.into(),
            file_name: file_name.into(),
            temp_path: temp_path.into(),
            complete: false,
            commit_time,
            expire_time: None,
        }
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.table_path.clone(), self.file_name.clone())
    }

    /// Copy of this entry marked complete, expiring `ttl_secs` after `now`
    pub fn as_complete(&self, now: u64, ttl_secs: u64) -> Self {
        Self {
            complete: true,
            expire_time: Some(now.saturating_add(ttl_secs)),
            ..self.clone()
        }
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(ATTR_TABLE_PATH.into(), AttributeValue::S(self.table_path.clone()));
        item.insert(ATTR_FILE_NAME.into(), AttributeValue::S(self.file_name.clone()));
        item.insert(ATTR_TEMP_PATH.into(), AttributeValue::S(self.temp_path.clone()));
        item.insert(ATTR_COMPLETE.into(), AttributeValue::S(self.complete.to_string()));
        item.insert(ATTR_COMMIT_TIME.into(), AttributeValue::N(self.commit_time.to_string()));
        if let Some(expire) = self.expire_time {
            item.insert(ATTR_EXPIRE_TIME.into(), AttributeValue::N(expire.to_string()));
        }
        item
    }

    pub fn from_item(item: &Item) -> Result<Self> {
        let complete = match string_attr(item, ATTR_COMPLETE)? {
            "true" => true,
            "false" => false,
            other => {
                return Err(LakeError::Serialization(format!(
                    "attribute {ATTR_COMPLETE} must be \"true\" or \"false\", got {other:?}"
                )))
            }
        };

        Ok(Self {
            table_path: string_attr(item, ATTR_TABLE_PATH)?.to_string(),
            file_name: string_attr(item, ATTR_FILE_NAME)?.to_string(),
            temp_path: string_attr(item, ATTR_TEMP_PATH)?.to_string(),
            complete,
            commit_time: number_attr(item, ATTR_COMMIT_TIME)?.ok_or_else(|| missing(ATTR_COMMIT_TIME))?,
            expire_time: number_attr(item, ATTR_EXPIRE_TIME)?,
        })
    }
}

fn missing(name: &str) -> LakeError {
    LakeError::Serialization(format!("missing attribute {name}"))
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str> {
    match item.get(name) {
        Some(AttributeValue::S(s)) => Ok(s),
        Some(other) => Err(LakeError::Serialization(format!(
            "attribute {name} must be a string, got {other:?}"
        ))),
        None => Err(missing(name)),
    }
}

fn number_attr(item: &Item, name: &str) -> Result<Option<u64>> {
    match item.get(name) {
        Some(AttributeValue::N(n)) => n.parse().map(Some).map_err(|_| {
            LakeError::Serialization(format!("attribute {name} is not a number: {n:?}"))
        }),
        Some(other) => Err(LakeError::Serialization(format!(
            "attribute {name} must be a number, got {other:?}"
        ))),
        None => Ok(None),
    }
}
