use thiserror::Error;

/// Errors surfaced by the WebHDFS clients, the codec and the relay
#[derive(Error, Debug)]
pub enum HdfsError {
    #[error("Metadata node answered {url} without a redirect or Location header")]
    RedirectMissing { url: String },

    #[error("Metadata node rejected {url} with status {status}: {body}")]
    MetadataNodeRejected { status: u16, body: String, url: String },

    #[error("Data node transfer to {url} failed ({}): {body}", describe_status(.status))]
    DataNodeTransfer {
        status: Option<u16>,
        body: String,
        url: String,
    },

    #[error("Malformed content: {message}")]
    MalformedContent { message: String },

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("Directory is not empty: {path}")]
    DirectoryNotEmpty { path: String },

    #[error("An entry of a different kind already exists at {path}")]
    PathConflict { path: String },

    #[error("Destination already exists: {path}")]
    DestinationExists { path: String },

    #[error("Gateway returned status {status} for {url}: {body}")]
    Gateway { status: u16, body: String, url: String },

    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid path {path}: {message}")]
    InvalidPath { path: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Relay upload failed with status {status}: {message}")]
    RelayUpload { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HdfsError {
    /// Wrap a reqwest failure that happened before any response arrived
    pub(crate) fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        HdfsError::Transport {
            url: url.into(),
            source,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            HdfsError::MetadataNodeRejected { status, .. }
            | HdfsError::Gateway { status, .. }
            | HdfsError::RelayUpload { status, .. } => Some(*status),
            HdfsError::DataNodeTransfer { status, .. } => *status,
            _ => None,
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no response".to_string(),
    }
}

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, HdfsError>;
