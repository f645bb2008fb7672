use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::Result,
    mime,
    path::HdfsPath,
    types::{FileContent, RemoteEntry, UploadIntent},
};

/// Core abstraction over a remote hierarchical filesystem
///
/// Implemented by the WebHDFS client and by the in-memory backend. Every
/// method is atomic from the caller's point of view: it either succeeds or
/// returns an error, and never retries on its own.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// List the contents of a directory
    ///
    /// Returns `HdfsError::NotFound` if the path doesn't exist; an existing
    /// empty directory yields an empty list
    async fn list(&self, path: &HdfsPath) -> Result<Vec<RemoteEntry>>;

    /// Fetch a file's bytes
    async fn read(&self, path: &HdfsPath) -> Result<Bytes>;

    /// Create or overwrite a file with the whole buffer
    async fn write_whole(&self, path: &HdfsPath, bytes: Bytes, content_type: &str) -> Result<()>;

    /// Append a whole buffer to an existing file
    ///
    /// Returns `HdfsError::NotFound` if the file doesn't exist
    async fn append(&self, path: &HdfsPath, bytes: Bytes) -> Result<()>;

    /// Delete a file or directory
    ///
    /// Returns `HdfsError::DirectoryNotEmpty` for a non-empty directory
    /// unless `recursive` is set
    async fn remove(&self, path: &HdfsPath, recursive: bool) -> Result<()>;

    /// Create a directory (and missing parents)
    ///
    /// Returns `HdfsError::PathConflict` if a file already sits there
    async fn mkdir(&self, path: &HdfsPath) -> Result<()>;

    /// Move an entry to an absolute destination path
    async fn rename(&self, from: &HdfsPath, destination: &str) -> Result<()>;

    /// Get a human-readable identifier for this backend (for logging/debugging)
    fn identifier(&self) -> String;

    /// Read a file together with the content type resolved from its name
    async fn open(&self, path: &HdfsPath) -> Result<FileContent> {
        let bytes = self.read(path).await?;
        Ok(FileContent {
            bytes,
            content_type: mime::resolve(path.file_name()).to_string(),
            path: path.clone(),
        })
    }

    /// Write an upload into its target directory, returning the file's path
    async fn upload(&self, intent: UploadIntent) -> Result<HdfsPath> {
        let target = intent.target_path();
        self.write_whole(&target, intent.payload, &intent.content_type)
            .await?;
        Ok(target)
    }

    /// Overwrite a file with edited text
    async fn save_text(&self, path: &HdfsPath, text: &str) -> Result<()> {
        let content_type = mime::resolve(path.file_name());
        self.write_whole(path, Bytes::copy_from_slice(text.as_bytes()), content_type)
            .await
    }

    /// Rename within the same parent directory, returning the new path
    async fn rename_to(&self, path: &HdfsPath, new_name: &str) -> Result<HdfsPath> {
        let target = path.parent().join(new_name);
        self.rename(path, target.as_str()).await?;
        Ok(target)
    }

    /// Check if a path exists
    ///
    /// Default implementation attempts a listing and returns true if successful
    async fn exists(&self, path: &HdfsPath) -> bool {
        self.list(path).await.is_ok()
    }
}
