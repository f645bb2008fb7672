use url::Url;

use crate::{
    config::{ConnectionConfig, RelayEndpoint},
    error::{HdfsError, Result},
    path::HdfsPath,
    relay::rewrite::rewrite_location,
};

/// How requests reach the metadata and data nodes
///
/// Implementors only decide URLs and credentials; the client performs the
/// HTTP exchanges. A transport is an immutable snapshot of configuration, so
/// both hops of one write always agree.
pub trait Transport: Send + Sync {
    /// URL of a metadata-node operation on `path`; `query` is already encoded
    fn metadata_url(&self, path: &HdfsPath, query: &str) -> Result<Url>;

    /// URL for the payload hop, given the `Location` the metadata node returned
    fn data_node_url(&self, location: &str) -> Result<Url>;

    /// HTTP Basic credentials to attach, if any
    fn credentials(&self) -> Option<(&str, &str)>;

    /// Human-readable identifier (for logging/debugging)
    fn identifier(&self) -> String;
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| HdfsError::InvalidConfig {
        message: format!("invalid URL {}: {}", raw, e),
    })
}

/// Resolve a possibly relative `Location` against `base`
fn resolve_against(base: &Url, location: &str) -> Result<Url> {
    let location = location.trim();
    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(location).map_err(|e| HdfsError::InvalidPath {
                path: location.to_string(),
                message: format!("unusable redirect target: {}", e),
            })
        }
        Err(e) => Err(HdfsError::InvalidPath {
            path: location.to_string(),
            message: format!("unusable redirect target: {}", e),
        }),
    }
}

/// Talks to the gateway and data nodes directly
///
/// Suitable wherever cross-origin restrictions do not apply.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    config: ConnectionConfig,
    gateway: Url,
}

impl DirectTransport {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let gateway = parse_url(&config.gateway_url())?;
        Ok(Self { config, gateway })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Transport for DirectTransport {
    fn metadata_url(&self, path: &HdfsPath, query: &str) -> Result<Url> {
        parse_url(&format!(
            "{}{}?{}",
            self.config.gateway_url(),
            path.encoded(),
            query
        ))
    }

    fn data_node_url(&self, location: &str) -> Result<Url> {
        resolve_against(&self.gateway, location)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        self.config.credentials()
    }

    fn identifier(&self) -> String {
        format!("direct:{}", self.config.gateway_url())
    }
}

/// Routes both hops through a same-origin relay
///
/// The relay injects gateway credentials itself, so none are sent.
#[derive(Debug, Clone)]
pub struct RelayedTransport {
    endpoint: RelayEndpoint,
    base: Url,
}

impl RelayedTransport {
    pub fn new(endpoint: RelayEndpoint) -> Result<Self> {
        let base = parse_url(&endpoint.base_url)?;
        Ok(Self { endpoint, base })
    }

    fn same_origin(&self, url: &Url) -> bool {
        url.scheme() == self.base.scheme()
            && url.host_str() == self.base.host_str()
            && url.port_or_known_default() == self.base.port_or_known_default()
    }
}

impl Transport for RelayedTransport {
    fn metadata_url(&self, path: &HdfsPath, query: &str) -> Result<Url> {
        parse_url(&format!(
            "{}{}{}?{}",
            self.endpoint.base_url.trim_end_matches('/'),
            self.endpoint.metadata_prefix.trim_end_matches('/'),
            path.encoded(),
            query
        ))
    }

    fn data_node_url(&self, location: &str) -> Result<Url> {
        let resolved = resolve_against(&self.base, location)?;
        if self.same_origin(&resolved) {
            return Ok(resolved);
        }

        // The relay did not rewrite the target; keep the hop on the relay origin
        let relayed = rewrite_location(resolved.as_str(), &self.endpoint.data_prefix)
            .ok_or_else(|| HdfsError::InvalidPath {
                path: location.to_string(),
                message: "redirect target cannot be relayed".to_string(),
            })?;
        resolve_against(&self.base, &relayed)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        None
    }

    fn identifier(&self) -> String {
        format!(
            "relay:{}{}",
            self.endpoint.base_url.trim_end_matches('/'),
            self.endpoint.metadata_prefix
        )
    }
}
