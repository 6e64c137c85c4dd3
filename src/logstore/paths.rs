//! Log layout
//!
//! ```text
//! {log_root}/
//!   ├── 00000000000000000000.json        canonical entry, version 0
//!   ├── 00000000000000000001.json
//!   ├── _commit_coordinator               strategy binding marker
//!   └── .tmp/
//!       └── 00000000000000000002.json.<uuid>   candidate payloads
//! ```

use uuid::Uuid;

use super::Version;

/// Directory (relative to the log root) holding candidate payloads
pub const TEMP_DIR: &str = ".tmp";

const VERSION_DIGITS: usize = 20;
const ENTRY_SUFFIX: &str = ".json";

/// Canonical file name for a version: "00000000000000000042.json"
pub fn file_name(version: Version) -> String {
    format!("{version:020}{ENTRY_SUFFIX}")
}

/// Parse a canonical file name back to its version
pub fn parse_version(name: &str) -> Option<Version> {
    let digits = name.strip_suffix(ENTRY_SUFFIX)?;
    if digits.len() != VERSION_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Fresh, unique temp path for a candidate of `version`, relative to the log root
pub fn new_temp_path(version: Version) -> String {
    format!("{TEMP_DIR}/{}.{}", file_name(version), Uuid::new_v4())
}

/// Join a log root and a relative path into an object key
pub fn join(log_root: &str, relative: &str) -> String {
    let root = log_root.trim_end_matches('/');
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{root}/{relative}")
    }
}

/// Object key of the canonical entry for `version`
pub fn canonical_path(log_root: &str, version: Version) -> String {
    join(log_root, &file_name(version))
}
