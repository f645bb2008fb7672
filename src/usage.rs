//! Aggregate storage usage by walking the directory tree
//!
//! Every call is a fresh traversal; results are never cached so the
//! dashboard always reflects the current state of the cluster.

use tracing::debug;

use crate::{
    config::DEFAULT_CAPACITY_BYTES,
    error::Result,
    path::HdfsPath,
    remote::RemoteFs,
    types::{EntryKind, StorageSummary},
};

/// Computes [`StorageSummary`] values over a [`RemoteFs`]
pub struct StorageAggregator<'a> {
    fs: &'a dyn RemoteFs,
    capacity_bytes: u64,
}

impl<'a> StorageAggregator<'a> {
    pub fn new(fs: &'a dyn RemoteFs) -> Self {
        Self {
            fs,
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
        }
    }

    /// Capacity reported as `total_bytes`
    pub fn with_capacity(fs: &'a dyn RemoteFs, capacity_bytes: u64) -> Self {
        Self { fs, capacity_bytes }
    }

    /// Walk `root` depth-first and sum every file below it
    pub async fn compute_usage(&self, root: &HdfsPath) -> Result<StorageSummary> {
        let (total_files, used_bytes) = self.walk(root).await?;
        Ok(StorageSummary {
            total_files,
            used_bytes,
            free_bytes: self.capacity_bytes.saturating_sub(used_bytes),
            total_bytes: self.capacity_bytes,
        })
    }

    /// Total size of the files under `path`
    pub async fn directory_size(&self, path: &HdfsPath) -> Result<u64> {
        Ok(self.walk(path).await?.1)
    }

    async fn walk(&self, root: &HdfsPath) -> Result<(u64, u64)> {
        let mut files = 0u64;
        let mut bytes = 0u64;
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = self.fs.list(&dir).await?;
            debug!(path = %dir, entries = entries.len(), "usage walk");

            // Reverse so children are visited in listing order
            for entry in entries.into_iter().rev() {
                match entry.kind {
                    EntryKind::File => {
                        files += 1;
                        bytes += entry.size_bytes.unwrap_or(0);
                    }
                    // A file lists as itself; only descend into real children
                    EntryKind::Directory if entry.path != dir => pending.push(entry.path),
                    EntryKind::Directory => {}
                }
            }
        }

        Ok((files, bytes))
    }
}

/// Human-readable size, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
