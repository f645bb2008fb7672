//! State and actions behind the file-manager view
//!
//! The dashboard owns no rendering. It keeps the current directory, its
//! listing, the last storage summary and the file open in the preview pane,
//! and replaces each piece only after the operation behind it succeeded.
//!
//! Mutations report the result of the remote change itself. The listing
//! refresh that follows is best effort: if it fails the old listing stays
//! and a warning is logged.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::{
    codec::{ContentCodec, Preview},
    config::DEFAULT_CAPACITY_BYTES,
    error::Result,
    path::HdfsPath,
    remote::RemoteFs,
    types::{RemoteEntry, StorageSummary, UploadIntent},
    usage::StorageAggregator,
};

/// A file shown in the preview pane
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub entry: RemoteEntry,
    pub preview: Preview,
}

pub struct Dashboard {
    fs: Arc<dyn RemoteFs>,
    codec: ContentCodec,
    capacity_bytes: u64,
    current: HdfsPath,
    entries: Vec<RemoteEntry>,
    usage: StorageSummary,
    selected: Option<OpenFile>,
}

impl Dashboard {
    pub fn new(fs: Arc<dyn RemoteFs>) -> Self {
        Self {
            fs,
            codec: ContentCodec::new(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            current: HdfsPath::root(),
            entries: Vec::new(),
            usage: StorageSummary::default(),
            selected: None,
        }
    }

    pub fn with_codec(mut self, codec: ContentCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    pub fn current_path(&self) -> &HdfsPath {
        &self.current
    }

    pub fn entries(&self) -> &[RemoteEntry] {
        &self.entries
    }

    pub fn usage(&self) -> &StorageSummary {
        &self.usage
    }

    pub fn selected(&self) -> Option<&OpenFile> {
        self.selected.as_ref()
    }

    /// Swap in a backend built from new connection settings
    ///
    /// Operations already in flight keep the backend they started with.
    pub fn replace_backend(&mut self, fs: Arc<dyn RemoteFs>) {
        info!(backend = %fs.identifier(), "backend replaced");
        self.fs = fs;
    }

    /// Show the contents of `path`
    pub async fn navigate(&mut self, path: HdfsPath) -> Result<()> {
        let entries = self.fs.list(&path).await?;
        self.current = path;
        self.entries = entries;
        Ok(())
    }

    pub async fn go_up(&mut self) -> Result<()> {
        let parent = self.current.parent();
        self.navigate(parent).await
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.entries = self.fs.list(&self.current).await?;
        Ok(())
    }

    pub async fn refresh_usage(&mut self) -> Result<()> {
        let aggregator = StorageAggregator::with_capacity(self.fs.as_ref(), self.capacity_bytes);
        self.usage = aggregator.compute_usage(&HdfsPath::root()).await?;
        Ok(())
    }

    /// Enter a directory or open a file in the preview pane
    pub async fn open_entry(&mut self, entry: &RemoteEntry) -> Result<()> {
        if entry.is_dir() {
            return self.navigate(entry.path.clone()).await;
        }

        let bytes = self.fs.read(&entry.path).await?;
        let declared = entry.content_type.as_deref().unwrap_or("");
        let preview = self.codec.decode_for_preview(&bytes, declared, &entry.name);
        self.selected = Some(OpenFile {
            entry: entry.clone(),
            preview,
        });
        Ok(())
    }

    pub fn close_preview(&mut self) {
        self.selected = None;
    }

    /// Write an edited preview back and close it
    ///
    /// Does nothing when no file is open. If the write fails the preview
    /// stays open; once it succeeds the preview is closed and `Ok` is
    /// returned even when the follow-up refresh fails.
    pub async fn save_preview(&mut self, edited: Preview) -> Result<()> {
        let Some(open) = &self.selected else {
            return Ok(());
        };
        let path = open.entry.path.clone();
        let content_type = edited.content_type().to_string();

        let bytes = self.codec.encode_for_write(&edited, &content_type)?;
        self.fs.write_whole(&path, bytes, &content_type).await?;

        self.selected = None;
        self.refresh_after("save", &path).await;
        Ok(())
    }

    /// Upload a file into the current directory
    pub async fn upload(&mut self, file_name: &str, payload: Bytes) -> Result<HdfsPath> {
        let intent = UploadIntent::new(self.current.clone(), file_name, payload);
        let target = self.fs.upload(intent).await?;
        self.refresh_after("upload", &target).await;
        Ok(target)
    }

    pub async fn create_subdirectory(&mut self, name: &str) -> Result<HdfsPath> {
        let target = self.current.join(name);
        self.fs.mkdir(&target).await?;
        self.refresh_after("mkdir", &target).await;
        Ok(target)
    }

    pub async fn rename_entry(&mut self, entry: &RemoteEntry, new_name: &str) -> Result<HdfsPath> {
        let target = self.fs.rename_to(&entry.path, new_name).await?;
        self.refresh_after("rename", &target).await;
        Ok(target)
    }

    /// Delete an entry; directories are removed with their contents
    pub async fn delete_entry(&mut self, entry: &RemoteEntry) -> Result<()> {
        self.fs.remove(&entry.path, entry.is_dir()).await?;
        if self
            .selected
            .as_ref()
            .is_some_and(|open| open.entry.path == entry.path)
        {
            self.selected = None;
        }
        self.refresh_after("delete", &entry.path).await;
        Ok(())
    }

    async fn refresh_after(&mut self, action: &str, path: &HdfsPath) {
        if let Err(e) = self.refresh().await {
            warn!(action, %path, error = %e, "change applied but the listing could not be refreshed");
        }
    }
}
