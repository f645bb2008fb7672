//! Connection and relay configuration
//!
//! `AppConfig` follows the layout of the dashboard's `app.config.json`:
//!
//! ```json
//! {
//!   "hdfs": {
//!     "namenode": { "host": "10.0.0.5", "port": 8443, "scheme": "https" },
//!     "datanode": { "host": "10.0.0.5", "port": 50075, "scheme": "http" },
//!     "auth": { "username": "svc", "password": "secret" },
//!     "paths": { "gatewayPath": "/gateway/default/webhdfs/v1/", "basePath": "" }
//!   },
//!   "server": { "backend": { "port": 3001 } }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{HdfsError, Result};

/// 1 TiB, shown as capacity when the cluster does not report one
pub const DEFAULT_CAPACITY_BYTES: u64 = 1024 * 1024 * 1024 * 1024;

/// Where and how to reach the WebHDFS gateway directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub scheme: String,
    pub gateway_host: String,
    pub gateway_port: u16,
    /// URL prefix of the REST root, e.g. `/webhdfs/v1`
    pub base_path: String,
    pub username: String,
    pub password: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            gateway_host: "localhost".to_string(),
            gateway_port: 9870,
            base_path: "/webhdfs/v1".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl ConnectionConfig {
    /// `scheme://host:port/base_path` without a trailing slash
    pub fn gateway_url(&self) -> String {
        let base = self.base_path.trim_matches('/');
        if base.is_empty() {
            format!("{}://{}:{}", self.scheme, self.gateway_host, self.gateway_port)
        } else {
            format!(
                "{}://{}:{}/{}",
                self.scheme, self.gateway_host, self.gateway_port, base
            )
        }
    }

    /// Basic credentials, if a user name is configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway_host.trim().is_empty() {
            return Err(HdfsError::InvalidConfig {
                message: "gateway host is empty".to_string(),
            });
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(HdfsError::InvalidConfig {
                message: format!("unsupported scheme {}", self.scheme),
            });
        }
        Ok(())
    }
}

/// A same-origin relay sitting in front of the metadata and data nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayEndpoint {
    /// Origin of the relay, e.g. `http://localhost:5173`
    pub base_url: String,
    pub metadata_prefix: String,
    pub data_prefix: String,
}

impl Default for RelayEndpoint {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            metadata_prefix: "/namenode-api".to_string(),
            data_prefix: "/datanode-api".to_string(),
        }
    }
}

impl RelayEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Ports are accepted both as JSON numbers and as numeric strings (`"8443"`)
fn port_number_or_text<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {:?}", text))),
    }
}

/// Host/port/scheme triple used for both node kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAddress {
    pub host: String,
    #[serde(deserialize_with = "port_number_or_text")]
    pub port: u16,
    pub scheme: String,
}

impl NodeAddress {
    fn new(host: &str, port: u16, scheme: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            scheme: scheme.to_string(),
        }
    }

    pub fn origin(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl Default for NodeAddress {
    fn default() -> Self {
        Self::new("localhost", 9870, "http")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathsConfig {
    pub gateway_path: String,
    pub base_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            gateway_path: "/webhdfs/v1/".to_string(),
            base_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdfsSection {
    pub namenode: NodeAddress,
    pub datanode: NodeAddress,
    pub auth: AuthConfig,
    pub paths: PathsConfig,
}

impl Default for HdfsSection {
    fn default() -> Self {
        Self {
            namenode: NodeAddress::new("localhost", 9870, "http"),
            datanode: NodeAddress::new("localhost", 9864, "http"),
            auth: AuthConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(deserialize_with = "port_number_or_text")]
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSection {
    pub backend: BackendConfig,
    pub bind: String,
    pub capacity_bytes: u64,
    /// Routing prefix the relay forwards to the metadata node
    pub metadata_prefix: String,
    /// Routing prefix the relay forwards to the data node
    pub data_prefix: String,
    /// Largest request body the relay accepts
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            bind: "0.0.0.0".to_string(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            metadata_prefix: "/namenode-api".to_string(),
            data_prefix: "/datanode-api".to_string(),
            max_body_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub hdfs: HdfsSection,
    pub server: ServerSection,
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&content)?;
        config.connection().validate()?;
        Ok(config)
    }

    /// Load from a JSON file, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "could not load config, using defaults");
            Self::default()
        })
    }

    /// Gateway connection as seen by a direct client
    ///
    /// `gatewayPath` and `basePath` are concatenated into the REST root.
    pub fn connection(&self) -> ConnectionConfig {
        let gateway = self.hdfs.paths.gateway_path.trim_matches('/');
        let base = self.hdfs.paths.base_path.trim_matches('/');
        let base_path = match (gateway.is_empty(), base.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!("/{}", gateway),
            (true, false) => format!("/{}", base),
            (false, false) => format!("/{}/{}", gateway, base),
        };

        ConnectionConfig {
            scheme: self.hdfs.namenode.scheme.clone(),
            gateway_host: self.hdfs.namenode.host.clone(),
            gateway_port: self.hdfs.namenode.port,
            base_path,
            username: self.hdfs.auth.username.clone(),
            password: self.hdfs.auth.password.clone(),
        }
    }
}
