use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, redirect, Client, Method, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::{ConnectionConfig, RelayEndpoint},
    error::{HdfsError, Result},
    mime,
    path::{encode_component, HdfsPath},
    protocol::{error_body, TwoHopWrite},
    remote::RemoteFs,
    transport::{DirectTransport, RelayedTransport, Transport},
    types::{EntryKind, RemoteEntry},
};

const USER_AGENT: &str = concat!("webhdfs-dashboard/", env!("CARGO_PKG_VERSION"));

/// A WebHDFS REST operation, selected with the `op` query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    ListStatus,
    Delete { recursive: bool },
    Mkdirs,
    Rename { destination: HdfsPath },
    Create { overwrite: bool },
    Append,
    Open,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::ListStatus => "LISTSTATUS",
            Op::Delete { .. } => "DELETE",
            Op::Mkdirs => "MKDIRS",
            Op::Rename { .. } => "RENAME",
            Op::Create { .. } => "CREATE",
            Op::Append => "APPEND",
            Op::Open => "OPEN",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Op::ListStatus | Op::Open => Method::GET,
            Op::Delete { .. } => Method::DELETE,
            Op::Mkdirs | Op::Rename { .. } | Op::Create { .. } => Method::PUT,
            Op::Append => Method::POST,
        }
    }

    /// Encoded query string, e.g. `op=DELETE&recursive=true`
    pub fn query(&self) -> String {
        match self {
            Op::Delete { recursive } => format!("op=DELETE&recursive={}", recursive),
            Op::Rename { destination } => format!(
                "op=RENAME&destination={}",
                encode_component(destination.as_str())
            ),
            Op::Create { overwrite } => format!("op=CREATE&overwrite={}", overwrite),
            other => format!("op={}", other.name()),
        }
    }
}

#[derive(Deserialize)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: Option<FileStatuses>,
}

#[derive(Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<FileStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    length: u64,
    modification_time: Option<u64>,
}

#[derive(Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Deserialize)]
struct RemoteExceptionEnvelope {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

#[derive(Deserialize)]
struct RemoteException {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
}

impl FileStatus {
    fn into_entry(self, listed: &HdfsPath) -> RemoteEntry {
        // Listing a file yields the file itself with an empty suffix
        let path = listed.join(&self.path_suffix);
        let kind = match self.entry_type.to_ascii_uppercase().as_str() {
            "DIRECTORY" => EntryKind::Directory,
            _ => EntryKind::File, // Symlinks and unknown types are shown as files
        };
        let name = path.file_name().to_string();
        let (size_bytes, content_type) = match kind {
            EntryKind::File => (Some(self.length), Some(mime::resolve(&name).to_string())),
            EntryKind::Directory => (None, None),
        };

        RemoteEntry {
            name,
            path,
            kind,
            size_bytes,
            content_type,
            modified_at_millis: self.modification_time,
        }
    }
}

/// Map a non-success response onto the error taxonomy
fn classify_failure(op: &Op, path: &HdfsPath, url: &Url, status: u16, body: String) -> HdfsError {
    let exception = serde_json::from_str::<RemoteExceptionEnvelope>(&body)
        .map(|e| e.remote_exception)
        .ok();
    let (name, message) = exception
        .as_ref()
        .map(|e| (e.exception.as_str(), e.message.as_str()))
        .unwrap_or(("", ""));

    if name == "FileNotFoundException" || status == StatusCode::NOT_FOUND.as_u16() {
        return HdfsError::NotFound {
            path: path.to_string(),
        };
    }
    if name == "PathIsNotEmptyDirectoryException" || message.contains("is non empty") {
        return HdfsError::DirectoryNotEmpty {
            path: path.to_string(),
        };
    }
    if matches!(
        name,
        "FileAlreadyExistsException" | "ParentNotDirectoryException"
    ) {
        match op {
            Op::Mkdirs => {
                return HdfsError::PathConflict {
                    path: path.to_string(),
                }
            }
            Op::Rename { destination } => {
                return HdfsError::DestinationExists {
                    path: destination.to_string(),
                }
            }
            _ => {}
        }
    }

    HdfsError::Gateway {
        status,
        body,
        url: url.to_string(),
    }
}

/// WebHDFS client for the metadata operations and two-hop writes
///
/// Cheap to clone. A client never changes its transport; build a new one
/// (see [`WebHdfsClient::reconfigure`]) when the connection settings change.
#[derive(Clone)]
pub struct WebHdfsClient {
    /// Never follows redirects; used for every request except reads
    http: Client,
    /// Follows redirects; `OPEN` is safe to follow transparently
    reader: Client,
    transport: Arc<dyn Transport>,
}

impl WebHdfsClient {
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        let build_error = |e: reqwest::Error| HdfsError::InvalidConfig {
            message: format!("could not build HTTP client: {}", e),
        };
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(build_error)?;
        let reader = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(build_error)?;

        Ok(Self {
            http,
            reader,
            transport,
        })
    }

    /// Client talking to the gateway directly
    pub fn direct(config: ConnectionConfig) -> Result<Self> {
        Self::new(Arc::new(DirectTransport::new(config)?))
    }

    /// Client routing every request through a same-origin relay
    pub fn relayed(endpoint: RelayEndpoint) -> Result<Self> {
        Self::new(Arc::new(RelayedTransport::new(endpoint)?))
    }

    /// A client sharing the HTTP pools but using a new configuration snapshot
    pub fn reconfigure(&self, transport: Arc<dyn Transport>) -> Self {
        Self {
            http: self.http.clone(),
            reader: self.reader.clone(),
            transport,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    async fn request(&self, client: &Client, op: &Op, path: &HdfsPath) -> Result<(Url, Response)> {
        let url = self.transport.metadata_url(path, &op.query())?;
        debug!(op = op.name(), %url, "metadata request");

        let mut request = client
            .request(op.method(), url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some((user, password)) = self.transport.credentials() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| HdfsError::transport(url.as_str(), e))?;
        Ok((url, response))
    }

    /// Send `op` and fail on any non-success status
    async fn expect_success(&self, client: &Client, op: &Op, path: &HdfsPath) -> Result<(Url, Response)> {
        let (url, response) = self.request(client, op, path).await?;
        let status = response.status();
        if status.is_success() {
            return Ok((url, response));
        }

        let body = error_body(&url, response).await;
        warn!(op = op.name(), %url, status = status.as_u16(), "gateway error");
        Err(classify_failure(op, path, &url, status.as_u16(), body))
    }

    /// Read a `{"boolean": ...}` answer
    async fn boolean(&self, op: &Op, path: &HdfsPath) -> Result<bool> {
        let (url, response) = self.expect_success(&self.http, op, path).await?;
        let answer: BooleanResponse = response
            .json()
            .await
            .map_err(|e| HdfsError::transport(url.as_str(), e))?;
        Ok(answer.boolean)
    }
}

#[async_trait]
impl RemoteFs for WebHdfsClient {
    /// List a directory; an existing empty directory yields an empty list
    async fn list(&self, path: &HdfsPath) -> Result<Vec<RemoteEntry>> {
        let (url, response) = self
            .expect_success(&self.http, &Op::ListStatus, path)
            .await?;
        let listing: ListStatusResponse = response
            .json()
            .await
            .map_err(|e| HdfsError::transport(url.as_str(), e))?;

        Ok(listing
            .file_statuses
            .map(|s| s.file_status)
            .unwrap_or_default()
            .into_iter()
            .map(|status| status.into_entry(path))
            .collect())
    }

    /// Delete a file, or a directory (non-empty ones need `recursive`)
    async fn remove(&self, path: &HdfsPath, recursive: bool) -> Result<()> {
        if self.boolean(&Op::Delete { recursive }, path).await? {
            Ok(())
        } else {
            Err(HdfsError::NotFound {
                path: path.to_string(),
            })
        }
    }

    /// Create a directory and any missing parents
    async fn mkdir(&self, path: &HdfsPath) -> Result<()> {
        if self.boolean(&Op::Mkdirs, path).await? {
            Ok(())
        } else {
            Err(HdfsError::PathConflict {
                path: path.to_string(),
            })
        }
    }

    /// Move `from` to the absolute path `destination`
    async fn rename(&self, from: &HdfsPath, destination: &str) -> Result<()> {
        let destination = HdfsPath::absolute(destination)?;
        let op = Op::Rename {
            destination: destination.clone(),
        };
        if self.boolean(&op, from).await? {
            Ok(())
        } else {
            Err(HdfsError::DestinationExists {
                path: destination.to_string(),
            })
        }
    }

    /// Fetch a file's bytes, following the data-node redirect
    async fn read(&self, path: &HdfsPath) -> Result<Bytes> {
        let (url, response) = self.expect_success(&self.reader, &Op::Open, path).await?;
        response
            .bytes()
            .await
            .map_err(|e| HdfsError::transport(url.as_str(), e))
    }

    /// Create or overwrite `path` with `bytes` through both hops
    async fn write_whole(&self, path: &HdfsPath, bytes: Bytes, content_type: &str) -> Result<()> {
        TwoHopWrite::new(
            &self.http,
            self.transport.as_ref(),
            path.clone(),
            bytes,
            content_type,
        )
        .run()
        .await
    }

    /// Append `bytes` to an existing file through both hops
    async fn append(&self, path: &HdfsPath, bytes: Bytes) -> Result<()> {
        TwoHopWrite::append(
            &self.http,
            self.transport.as_ref(),
            path.clone(),
            bytes,
            mime::OCTET_STREAM,
        )
        .run()
        .await
    }

    fn identifier(&self) -> String {
        self.transport.identifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://gw/webhdfs/v1/x").unwrap()
    }

    #[test]
    fn test_op_queries() {
        assert_eq!(Op::ListStatus.query(), "op=LISTSTATUS");
        assert_eq!(Op::Delete { recursive: false }.query(), "op=DELETE&recursive=false");
        assert_eq!(Op::Create { overwrite: true }.query(), "op=CREATE&overwrite=true");
        assert_eq!(
            Op::Rename {
                destination: HdfsPath::new("/new dir/b.txt")
            }
            .query(),
            "op=RENAME&destination=%2Fnew%20dir%2Fb.txt"
        );
        assert_eq!(Op::Open.method(), Method::GET);
        assert_eq!(Op::Mkdirs.method(), Method::PUT);
        assert_eq!(Op::Delete { recursive: true }.method(), Method::DELETE);
        assert_eq!(Op::Append.query(), "op=APPEND");
        assert_eq!(Op::Append.method(), Method::POST);
    }

    #[test]
    fn test_file_status_conversion() {
        let listed = HdfsPath::new("/data");
        let file = FileStatus {
            path_suffix: "a.csv".to_string(),
            entry_type: "FILE".to_string(),
            length: 42,
            modification_time: Some(1_700_000_000_000),
        }
        .into_entry(&listed);
        assert_eq!(file.path.as_str(), "/data/a.csv");
        assert_eq!(file.size_bytes, Some(42));
        assert_eq!(file.content_type.as_deref(), Some("text/csv"));

        let dir = FileStatus {
            path_suffix: "sub".to_string(),
            entry_type: "DIRECTORY".to_string(),
            length: 0,
            modification_time: None,
        }
        .into_entry(&listed);
        assert!(dir.is_dir());
        assert_eq!(dir.size_bytes, None);

        let itself = FileStatus {
            path_suffix: String::new(),
            entry_type: "FILE".to_string(),
            length: 1,
            modification_time: None,
        }
        .into_entry(&HdfsPath::new("/data/x.txt"));
        assert_eq!(itself.name, "x.txt");
        assert_eq!(itself.path.as_str(), "/data/x.txt");
    }

    #[test]
    fn test_classify_failure() {
        let path = HdfsPath::new("/x");
        let not_found = r#"{"RemoteException":{"exception":"FileNotFoundException","javaClassName":"java.io.FileNotFoundException","message":"File does not exist: /x"}}"#;
        assert!(matches!(
            classify_failure(&Op::ListStatus, &path, &url(), 404, not_found.to_string()),
            HdfsError::NotFound { .. }
        ));

        let not_empty = r#"{"RemoteException":{"exception":"PathIsNotEmptyDirectoryException","message":"`/x is non empty': Directory is not empty"}}"#;
        assert!(matches!(
            classify_failure(&Op::Delete { recursive: false }, &path, &url(), 403, not_empty.to_string()),
            HdfsError::DirectoryNotEmpty { .. }
        ));

        let exists = r#"{"RemoteException":{"exception":"FileAlreadyExistsException","message":"Path is not a directory: /x"}}"#;
        assert!(matches!(
            classify_failure(&Op::Mkdirs, &path, &url(), 403, exists.to_string()),
            HdfsError::PathConflict { .. }
        ));
        assert!(matches!(
            classify_failure(
                &Op::Rename { destination: HdfsPath::new("/y") },
                &path,
                &url(),
                403,
                exists.to_string()
            ),
            HdfsError::DestinationExists { path } if path == "/y"
        ));

        match classify_failure(&Op::Open, &path, &url(), 500, "boom".to_string()) {
            HdfsError::Gateway { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
