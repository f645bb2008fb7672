use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{
    error::{HdfsError, Result},
    path::HdfsPath,
    remote::RemoteFs,
    types::{EntryKind, RemoteEntry},
};

#[derive(Debug, Clone)]
enum Node {
    Directory {
        modified: u64,
    },
    File {
        bytes: Bytes,
        content_type: String,
        modified: u64,
    },
}

impl Node {
    fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn is_within(path: &HdfsPath, ancestor: &HdfsPath) -> bool {
    ancestor.is_root()
        || path == ancestor
        || path
            .as_str()
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
}

fn memory_url(path: &HdfsPath) -> String {
    format!("memory://{}", path)
}

/// In-memory filesystem with the gateway's semantics
///
/// Useful for offline demos and for exercising the controller without a
/// cluster. The root directory always exists.
pub struct MemoryFs {
    nodes: Arc<RwLock<BTreeMap<HdfsPath, Node>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(HdfsPath::root(), Node::Directory { modified: now_millis() });
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }

    /// Number of files currently stored
    pub async fn file_count(&self) -> usize {
        let nodes = self.nodes.read().await;
        nodes.values().filter(|n| !n.is_dir()).count()
    }

    /// Content type a file was written with
    pub async fn content_type(&self, path: &HdfsPath) -> Option<String> {
        let nodes = self.nodes.read().await;
        match nodes.get(path) {
            Some(Node::File { content_type, .. }) => Some(content_type.clone()),
            _ => None,
        }
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn entry(path: &HdfsPath, node: &Node) -> RemoteEntry {
    let name = path.file_name().to_string();
    match node {
        Node::Directory { modified } => RemoteEntry {
            name,
            path: path.clone(),
            kind: EntryKind::Directory,
            size_bytes: None,
            content_type: None,
            modified_at_millis: Some(*modified),
        },
        Node::File {
            bytes,
            content_type,
            modified,
        } => RemoteEntry {
            name,
            path: path.clone(),
            kind: EntryKind::File,
            size_bytes: Some(bytes.len() as u64),
            content_type: Some(content_type.clone()),
            modified_at_millis: Some(*modified),
        },
    }
}

/// Every ancestor of `path`, root first, excluding `path` itself
fn ancestors(path: &HdfsPath) -> Vec<HdfsPath> {
    let mut chain = Vec::new();
    let mut current = path.parent();
    while !current.is_root() {
        chain.push(current.clone());
        current = current.parent();
    }
    chain.push(HdfsPath::root());
    chain.reverse();
    chain
}

/// Create missing ancestors; fails if one of them is a file
fn ensure_parents(nodes: &mut BTreeMap<HdfsPath, Node>, path: &HdfsPath) -> std::result::Result<(), HdfsPath> {
    for ancestor in ancestors(path) {
        match nodes.get(&ancestor) {
            Some(node) if node.is_dir() => {}
            Some(_) => return Err(ancestor),
            None => {
                nodes.insert(ancestor, Node::Directory { modified: now_millis() });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn list(&self, path: &HdfsPath) -> Result<Vec<RemoteEntry>> {
        let nodes = self.nodes.read().await;
        match nodes.get(path) {
            None => Err(HdfsError::NotFound {
                path: path.to_string(),
            }),
            Some(node @ Node::File { .. }) => Ok(vec![entry(path, node)]),
            Some(Node::Directory { .. }) => Ok(nodes
                .iter()
                .filter(|(child, _)| *child != path && child.parent() == *path)
                .map(|(child, node)| entry(child, node))
                .collect()),
        }
    }

    async fn read(&self, path: &HdfsPath) -> Result<Bytes> {
        let nodes = self.nodes.read().await;
        match nodes.get(path) {
            Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
            _ => Err(HdfsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn write_whole(&self, path: &HdfsPath, bytes: Bytes, content_type: &str) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        if nodes.get(path).is_some_and(Node::is_dir) {
            return Err(HdfsError::MetadataNodeRejected {
                status: 403,
                body: format!("{} is a directory", path),
                url: memory_url(path),
            });
        }
        ensure_parents(&mut nodes, path).map_err(|blocking| HdfsError::MetadataNodeRejected {
            status: 403,
            body: format!("parent {} is not a directory", blocking),
            url: memory_url(path),
        })?;

        nodes.insert(
            path.clone(),
            Node::File {
                bytes,
                content_type: content_type.to_string(),
                modified: now_millis(),
            },
        );
        Ok(())
    }

    async fn append(&self, path: &HdfsPath, bytes: Bytes) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(path) {
            Some(Node::File {
                bytes: existing,
                modified,
                ..
            }) => {
                let mut joined = Vec::with_capacity(existing.len() + bytes.len());
                joined.extend_from_slice(existing);
                joined.extend_from_slice(&bytes);
                *existing = Bytes::from(joined);
                *modified = now_millis();
                Ok(())
            }
            _ => Err(HdfsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn remove(&self, path: &HdfsPath, recursive: bool) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let Some(node) = nodes.get(path) else {
            return Err(HdfsError::NotFound {
                path: path.to_string(),
            });
        };

        if node.is_dir() {
            let has_children = nodes
                .keys()
                .any(|other| other != path && is_within(other, path));
            if has_children && !recursive {
                return Err(HdfsError::DirectoryNotEmpty {
                    path: path.to_string(),
                });
            }
        }

        nodes.retain(|other, _| other.is_root() || !is_within(other, path));
        Ok(())
    }

    async fn mkdir(&self, path: &HdfsPath) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        match nodes.get(path) {
            Some(node) if node.is_dir() => return Ok(()),
            Some(_) => {
                return Err(HdfsError::PathConflict {
                    path: path.to_string(),
                })
            }
            None => {}
        }
        ensure_parents(&mut nodes, path)
            .map_err(|blocking| HdfsError::PathConflict { path: blocking.to_string() })?;
        nodes.insert(path.clone(), Node::Directory { modified: now_millis() });
        Ok(())
    }

    async fn rename(&self, from: &HdfsPath, destination: &str) -> Result<()> {
        let destination = HdfsPath::absolute(destination)?;
        let mut nodes = self.nodes.write().await;

        if from.is_root() || !nodes.contains_key(from) {
            return Err(HdfsError::NotFound {
                path: from.to_string(),
            });
        }
        if nodes.contains_key(&destination) {
            return Err(HdfsError::DestinationExists {
                path: destination.to_string(),
            });
        }
        if is_within(&destination, from) {
            return Err(HdfsError::InvalidPath {
                path: destination.to_string(),
                message: format!("cannot move {} into itself", from),
            });
        }
        let parent = destination.parent();
        if !nodes.get(&parent).is_some_and(Node::is_dir) {
            return Err(HdfsError::NotFound {
                path: parent.to_string(),
            });
        }

        let moved: Vec<HdfsPath> = nodes
            .keys()
            .filter(|p| is_within(p, from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let suffix = &old.as_str()[from.as_str().len()..];
                nodes.insert(destination.join(suffix), node);
            }
        }
        Ok(())
    }

    fn identifier(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> HdfsPath {
        HdfsPath::new(raw)
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let fs = MemoryFs::new();
        fs.write_whole(&p("/a/b/c.txt"), Bytes::from("x"), "text/plain")
            .await
            .unwrap();

        let root = fs.list(&p("/")).await.unwrap();
        assert_eq!(root.len(), 1);
        assert!(root[0].is_dir());
        assert_eq!(fs.list(&p("/a/b")).await.unwrap()[0].name, "c.txt");
        assert_eq!(fs.content_type(&p("/a/b/c.txt")).await.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_list_file_returns_itself() {
        let fs = MemoryFs::new();
        fs.write_whole(&p("/f.txt"), Bytes::from("abc"), "text/plain")
            .await
            .unwrap();
        let listing = fs.list(&p("/f.txt")).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].size_bytes, Some(3));
    }

    #[tokio::test]
    async fn test_mkdir_conflicts_with_file() {
        let fs = MemoryFs::new();
        fs.write_whole(&p("/f"), Bytes::new(), "application/octet-stream")
            .await
            .unwrap();
        assert!(matches!(
            fs.mkdir(&p("/f")).await,
            Err(HdfsError::PathConflict { .. })
        ));
        assert!(matches!(
            fs.mkdir(&p("/f/sub")).await,
            Err(HdfsError::PathConflict { .. })
        ));
        fs.mkdir(&p("/d/e")).await.unwrap();
        fs.mkdir(&p("/d/e")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let fs = MemoryFs::new();
        fs.write_whole(&p("/src/x/1.txt"), Bytes::from("1"), "text/plain")
            .await
            .unwrap();
        fs.mkdir(&p("/dst")).await.unwrap();

        fs.rename(&p("/src"), "/dst/moved").await.unwrap();
        assert_eq!(fs.read(&p("/dst/moved/x/1.txt")).await.unwrap(), Bytes::from("1"));
        assert!(!fs.exists(&p("/src")).await);

        assert!(matches!(
            fs.rename(&p("/dst"), "relative").await,
            Err(HdfsError::InvalidPath { .. })
        ));
        assert!(matches!(
            fs.rename(&p("/dst"), "/dst/moved/inner").await,
            Err(HdfsError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_append() {
        let fs = MemoryFs::new();
        fs.write_whole(&p("/log.txt"), Bytes::from("a\n"), "text/plain")
            .await
            .unwrap();
        fs.append(&p("/log.txt"), Bytes::from("b\n")).await.unwrap();
        assert_eq!(fs.read(&p("/log.txt")).await.unwrap(), Bytes::from("a\nb\n"));
        assert!(matches!(
            fs.append(&p("/missing.txt"), Bytes::from("x")).await,
            Err(HdfsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_over_directory_is_rejected() {
        let fs = MemoryFs::new();
        fs.mkdir(&p("/d")).await.unwrap();
        assert!(matches!(
            fs.write_whole(&p("/d"), Bytes::new(), "text/plain").await,
            Err(HdfsError::MetadataNodeRejected { status: 403, .. })
        ));
    }
}
