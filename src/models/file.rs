use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// Metadata of one file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Last modification time (Unix timestamp)
    pub last_modified: i64,
    pub directory: bool,
}

impl FileInfo {
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        Self {
            name: name.into(),
            size: metadata.len(),
            last_modified,
            directory: metadata.is_dir(),
        }
    }
}

/// Result of listing a path
///
/// `children` is only present for directories, and is an empty list (not
/// absent) for an empty directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    #[serde(flatten)]
    pub entry: FileInfo,
    pub root: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileInfo>>,
}
