use serde::{Deserialize, Serialize};

use crate::path::HdfsPath;

/// One row of a directory listing
///
/// Snapshots are never mutated in place; a refresh replaces the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// Last path segment
    pub name: String,
    /// Absolute, normalized path
    pub path: HdfsPath,
    pub kind: EntryKind,
    /// Length in bytes; absent for directories
    pub size_bytes: Option<u64>,
    /// Resolved from the file name; absent for directories
    pub content_type: Option<String>,
    pub modified_at_millis: Option<u64>,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Type of directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    File,
    Directory,
}

/// A file's bytes plus the content type they were resolved to
#[derive(Debug, Clone)]
pub struct FileContent {
    /// The raw bytes of the file
    pub bytes: bytes::Bytes,
    pub content_type: String,
    /// The path the bytes were read from
    pub path: HdfsPath,
}

/// Aggregate usage computed by a full traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSummary {
    pub total_files: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub total_bytes: u64,
}

impl StorageSummary {
    /// Share of capacity in use, 0.0 when capacity is unknown
    pub fn used_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// A pending upload of one file into a directory
#[derive(Debug, Clone)]
pub struct UploadIntent {
    pub target_directory: HdfsPath,
    pub file_name: String,
    pub payload: bytes::Bytes,
    pub content_type: String,
}

impl UploadIntent {
    /// Build an intent whose content type is resolved from the file name
    pub fn new(target_directory: HdfsPath, file_name: &str, payload: bytes::Bytes) -> Self {
        Self {
            target_directory,
            file_name: file_name.to_string(),
            payload,
            content_type: crate::mime::resolve(file_name).to_string(),
        }
    }

    pub fn target_path(&self) -> HdfsPath {
        self.target_directory.join(&self.file_name)
    }
}
