//! Two-hop create/overwrite protocol
//!
//! A write first asks the metadata node to `CREATE` the path. The metadata
//! node does not take the payload; it answers with a redirect whose
//! `Location` names a data node. The payload is then `PUT` there in one
//! piece. The whole sequence is one unit of work: there is no retry and no
//! way to resume at the second hop, a failed write restarts from the first.

use bytes::Bytes;
use reqwest::{header, Client, Response};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{HdfsError, Result},
    path::HdfsPath,
    transport::Transport,
    webhdfs::Op,
};

/// Progress of a single write
#[derive(Debug)]
pub enum WriteState {
    Init,
    /// The create request was answered; its redirect has not been inspected yet
    AwaitingRedirect { url: Url, response: Response },
    /// Sending the payload to the data node
    Transferring { location: Url },
    Done,
    Failed { reason: String },
}

impl WriteState {
    pub fn name(&self) -> &'static str {
        match self {
            WriteState::Init => "init",
            WriteState::AwaitingRedirect { .. } => "awaiting_redirect",
            WriteState::Transferring { .. } => "transferring",
            WriteState::Done => "done",
            WriteState::Failed { .. } => "failed",
        }
    }
}

/// How to proceed after the metadata node answered the create request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiation<'a> {
    /// Continue with the payload hop at this target
    Proceed(&'a str),
    /// The metadata node refused the request
    Rejected,
    /// Neither a usable redirect nor a `Location` header
    RedirectMissing,
}

pub fn is_redirect_status(status: u16) -> bool {
    (300..400).contains(&status)
}

/// Decide what an initiation response means
///
/// `status` 0 stands for an opaque response whose status was hidden by the
/// network stack. A usable `Location` is enough to proceed whatever the
/// status, unless the status is an outright client or server error.
pub fn classify_initiation(status: u16, location: Option<&str>) -> Initiation<'_> {
    if (400..600).contains(&status) {
        return Initiation::Rejected;
    }
    match location.map(str::trim).filter(|l| !l.is_empty()) {
        Some(target) => Initiation::Proceed(target),
        None => Initiation::RedirectMissing,
    }
}

/// One write of a whole buffer to one path
pub struct TwoHopWrite<'a> {
    http: &'a Client,
    transport: &'a dyn Transport,
    op: Op,
    path: HdfsPath,
    payload: Bytes,
    content_type: String,
    state: WriteState,
}

impl<'a> TwoHopWrite<'a> {
    /// Create or overwrite `path`; `http` must not follow redirects
    pub fn new(
        http: &'a Client,
        transport: &'a dyn Transport,
        path: HdfsPath,
        payload: Bytes,
        content_type: &str,
    ) -> Self {
        Self::with_op(http, transport, Op::Create { overwrite: true }, path, payload, content_type)
    }

    /// Append to an existing file at `path`
    pub fn append(
        http: &'a Client,
        transport: &'a dyn Transport,
        path: HdfsPath,
        payload: Bytes,
        content_type: &str,
    ) -> Self {
        Self::with_op(http, transport, Op::Append, path, payload, content_type)
    }

    fn with_op(
        http: &'a Client,
        transport: &'a dyn Transport,
        op: Op,
        path: HdfsPath,
        payload: Bytes,
        content_type: &str,
    ) -> Self {
        Self {
            http,
            transport,
            op,
            path,
            payload,
            content_type: content_type.to_string(),
            state: WriteState::Init,
        }
    }

    pub fn state(&self) -> &WriteState {
        &self.state
    }

    /// Drive the write to completion
    pub async fn run(mut self) -> Result<()> {
        loop {
            if matches!(self.state, WriteState::Done) {
                info!(op = self.op.name(), path = %self.path, bytes = self.payload.len(), "write complete");
                return Ok(());
            }
            self.step().await?;
        }
    }

    async fn step(&mut self) -> Result<()> {
        let current = std::mem::replace(&mut self.state, WriteState::Init);
        let from = current.name();
        match self.advance(current).await {
            Ok(next) => {
                debug!(path = %self.path, from, to = next.name(), "write state");
                self.state = next;
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path, from, error = %e, "write failed");
                self.state = WriteState::Failed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    async fn advance(&self, state: WriteState) -> Result<WriteState> {
        match state {
            WriteState::Init => self.initiate().await,
            WriteState::AwaitingRedirect { url, response } => self.follow(url, response).await,
            WriteState::Transferring { location } => self.transfer(location).await,
            done_or_failed => Ok(done_or_failed),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.transport.credentials() {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn initiate(&self) -> Result<WriteState> {
        let op = &self.op;
        let url = self.transport.metadata_url(&self.path, &op.query())?;
        debug!(op = op.name(), %url, "requesting data node location");

        let request = self
            .http
            .request(op.method(), url.clone())
            .header(header::CONTENT_TYPE, self.content_type.as_str())
            .header(header::ACCEPT, "*/*");
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| HdfsError::transport(url.as_str(), e))?;

        Ok(WriteState::AwaitingRedirect { url, response })
    }

    async fn follow(&self, url: Url, response: Response) -> Result<WriteState> {
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        match classify_initiation(status, location.as_deref()) {
            Initiation::Proceed(target) => {
                if !is_redirect_status(status) {
                    warn!(status, %url, "no redirect status but a Location header; proceeding");
                }
                let location = self.transport.data_node_url(target)?;
                debug!(status, %location, "metadata node redirected");
                Ok(WriteState::Transferring { location })
            }
            Initiation::Rejected => {
                let body = error_body(&url, response).await;
                Err(HdfsError::MetadataNodeRejected {
                    status,
                    body,
                    url: url.to_string(),
                })
            }
            Initiation::RedirectMissing => Err(HdfsError::RedirectMissing {
                url: url.to_string(),
            }),
        }
    }

    async fn transfer(&self, location: Url) -> Result<WriteState> {
        debug!(%location, bytes = self.payload.len(), "sending payload to data node");

        // The payload goes with the same method as the initiation
        let request = self
            .http
            .request(self.op.method(), location.clone())
            .header(header::CONTENT_TYPE, self.content_type.as_str())
            .header(header::CONTENT_LENGTH, self.payload.len())
            .header(header::ACCEPT, "*/*")
            .body(self.payload.clone());

        let response = self.authorize(request).send().await.map_err(|e| {
            HdfsError::DataNodeTransfer {
                status: None,
                body: e.to_string(),
                url: location.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(WriteState::Done);
        }

        let body = error_body(&location, response).await;
        Err(HdfsError::DataNodeTransfer {
            status: Some(status.as_u16()),
            body,
            url: location.to_string(),
        })
    }
}

/// Body of a failed response, or an empty string when it cannot be read
pub(crate) async fn error_body(url: &Url, response: Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(%url, error = %e, "could not read error body");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::transport::DirectTransport;
    use mockito::Matcher;

    #[test]
    fn test_classify_redirect() {
        assert_eq!(
            classify_initiation(307, Some("http://dn/x")),
            Initiation::Proceed("http://dn/x")
        );
        assert_eq!(classify_initiation(307, None), Initiation::RedirectMissing);
        assert_eq!(classify_initiation(307, Some("  ")), Initiation::RedirectMissing);
    }

    #[test]
    fn test_classify_opaque_status() {
        assert_eq!(
            classify_initiation(0, Some("/datanode-api/x")),
            Initiation::Proceed("/datanode-api/x")
        );
        assert_eq!(classify_initiation(0, None), Initiation::RedirectMissing);
    }

    #[test]
    fn test_classify_non_redirect() {
        assert_eq!(classify_initiation(200, None), Initiation::RedirectMissing);
        assert_eq!(classify_initiation(201, Some("http://dn/x")), Initiation::Proceed("http://dn/x"));
        assert_eq!(classify_initiation(403, Some("http://dn/x")), Initiation::Rejected);
        assert_eq!(classify_initiation(500, None), Initiation::Rejected);
    }

    fn transport_for(server: &mockito::Server) -> DirectTransport {
        let addr = server.host_with_port();
        let (host, port) = addr.rsplit_once(':').unwrap();
        DirectTransport::new(ConnectionConfig {
            gateway_host: host.to_string(),
            gateway_port: port.parse().unwrap(),
            ..ConnectionConfig::default()
        })
        .unwrap()
    }

    fn no_redirects() -> Client {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let mut server = mockito::Server::new_async().await;
        let location = format!("{}/dn/webhdfs/v1/t/a.txt?op=CREATE", server.url());
        server
            .mock("PUT", "/webhdfs/v1/t/a.txt")
            .match_query(Matcher::UrlEncoded("op".into(), "CREATE".into()))
            .with_status(307)
            .with_header("location", &location)
            .create_async()
            .await;
        server
            .mock("PUT", "/dn/webhdfs/v1/t/a.txt")
            .match_body("abc")
            .with_status(201)
            .create_async()
            .await;

        let http = no_redirects();
        let transport = transport_for(&server);
        let mut write = TwoHopWrite::new(
            &http,
            &transport,
            HdfsPath::new("/t/a.txt"),
            Bytes::from_static(b"abc"),
            "text/plain",
        );

        assert!(matches!(write.state(), WriteState::Init));
        write.step().await.unwrap();
        assert!(matches!(write.state(), WriteState::AwaitingRedirect { .. }));
        write.step().await.unwrap();
        match write.state() {
            WriteState::Transferring { location: target } => {
                assert_eq!(target.as_str(), location)
            }
            other => panic!("unexpected state {:?}", other),
        }
        write.step().await.unwrap();
        assert!(matches!(write.state(), WriteState::Done));
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/webhdfs/v1/t/a.txt")
            .match_query(Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let http = no_redirects();
        let transport = transport_for(&server);
        let mut write = TwoHopWrite::new(
            &http,
            &transport,
            HdfsPath::new("/t/a.txt"),
            Bytes::new(),
            "text/plain",
        );

        write.step().await.unwrap();
        let err = write.step().await.unwrap_err();
        assert!(matches!(err, HdfsError::RedirectMissing { .. }));
        assert!(matches!(write.state(), WriteState::Failed { .. }));

        // Stepping a failed write does not resume it
        write.step().await.unwrap();
        assert!(matches!(write.state(), WriteState::Failed { .. }));
    }
}
