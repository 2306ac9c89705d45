//! File model shared between the host build and the transform pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suffix appended to a file key to name its companion source map entry.
pub const MAP_SUFFIX: &str = ".map";

/// The in-memory file set a build operates on, keyed by `/`-separated relative path.
pub type Files = std::collections::BTreeMap<String, FileEntry>;

/// Key of the companion source map entry for `key`.
pub fn map_key(key: &str) -> String {
    format!("{key}{MAP_SUFFIX}")
}

// ---------------------------------------------------------------------------
// FileEntry
// ---------------------------------------------------------------------------

/// A single file in the build: raw contents plus the metadata read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Raw file bytes.
    pub contents: Vec<u8>,
    /// Octal permission string (e.g. `0644`), when the host knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Filesystem metadata captured at read time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<FileStats>,
}

impl FileEntry {
    /// Create an entry with the given contents and no metadata.
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            mode: None,
            stats: None,
        }
    }

    /// Contents decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Subset of filesystem metadata carried alongside a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    /// Size in bytes at read time.
    pub size: u64,
    /// Last modification time, if the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}
