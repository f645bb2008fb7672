//! Same-origin relay in front of the metadata and data nodes
//!
//! Requests under the metadata prefix are forwarded to the gateway with the
//! relay's own credentials; requests under the data prefix go to the data
//! node. Redirects from the metadata node are not followed: their `Location`
//! is rewritten onto the data prefix so a browser's payload hop stays on
//! this origin. Cross-origin requests get the caller's origin mirrored back
//! with credentials allowed.

pub mod rewrite;
pub mod upload;

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use reqwest::{redirect, Client};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    error::{HdfsError, Result},
    webhdfs::WebHdfsClient,
};

use self::rewrite::{rewrite_location, strip_route_prefix};

pub use self::upload::{upload_via_relay, UploadReply, UPLOAD_ROUTE};

/// Request headers never copied upstream
const SKIPPED_REQUEST_HEADERS: &[&str] = &["host", "content-length", "connection", "transfer-encoding"];

/// Response headers never copied back (recomputed or replaced by the relay)
const SKIPPED_RESPONSE_HEADERS: &[&str] = &["content-length", "connection", "transfer-encoding"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Metadata,
    Data,
}

/// Shared state of the relay server
pub struct RelayState {
    upstream: Client,
    metadata_upstream: String,
    data_upstream: String,
    credentials: Option<(String, String)>,
    metadata_prefix: String,
    data_prefix: String,
    max_body_bytes: usize,
    uploader: WebHdfsClient,
}

impl RelayState {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let connection = config.connection();
        let upstream = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| HdfsError::InvalidConfig {
                message: format!("could not build HTTP client: {}", e),
            })?;
        let credentials = connection
            .credentials()
            .map(|(user, password)| (user.to_string(), password.to_string()));

        Ok(Self {
            upstream,
            metadata_upstream: connection.gateway_url(),
            data_upstream: config.hdfs.datanode.origin(),
            credentials,
            metadata_prefix: config.server.metadata_prefix.clone(),
            data_prefix: config.server.data_prefix.clone(),
            max_body_bytes: config.server.max_body_bytes,
            uploader: WebHdfsClient::direct(connection)?,
        })
    }

    pub(crate) fn uploader(&self) -> &WebHdfsClient {
        &self.uploader
    }

    fn route(&self, path: &str) -> Option<(Route, String)> {
        if let Some(rest) = strip_route_prefix(path, &self.metadata_prefix) {
            return Some((Route::Metadata, format!("{}{}", self.metadata_upstream, rest)));
        }
        strip_route_prefix(path, &self.data_prefix)
            .map(|rest| (Route::Data, format!("{}{}", self.data_upstream, rest)))
    }

    async fn forward(
        &self,
        route: Route,
        method: &Method,
        target: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response> {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(|e| {
            HdfsError::InvalidConfig {
                message: format!("unsupported method: {}", e),
            }
        })?;

        let mut request = self.upstream.request(method, target);
        for (name, value) in headers {
            let name = name.as_str();
            if SKIPPED_REQUEST_HEADERS.contains(&name)
                || (route == Route::Metadata && name == "authorization")
            {
                continue;
            }
            request = request.header(name, value.as_bytes());
        }
        if route == Route::Metadata {
            if let Some((user, password)) = &self.credentials {
                request = request.basic_auth(user, Some(password));
            }
        }

        let upstream = request
            .body(body)
            .send()
            .await
            .map_err(|e| HdfsError::transport(target, e))?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        debug!(?route, target, status = status.as_u16(), "upstream answered");

        let mut relayed_headers = HeaderMap::new();
        for (name, value) in upstream.headers() {
            if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                relayed_headers.append(name, value);
            }
        }

        if route == Route::Metadata && status.is_redirection() {
            self.rewrite_redirect(&mut relayed_headers);
        }

        let body = upstream
            .bytes()
            .await
            .map_err(|e| HdfsError::transport(target, e))?;

        let mut response = (status, body).into_response();
        response.headers_mut().extend(relayed_headers);
        Ok(response)
    }

    fn rewrite_redirect(&self, headers: &mut HeaderMap) {
        let Some(original) = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
        else {
            warn!("metadata node redirected without a Location header");
            return;
        };

        match rewrite_location(&original, &self.data_prefix)
            .and_then(|rewritten| HeaderValue::from_str(&rewritten).ok())
        {
            Some(rewritten) => {
                debug!(%original, rewritten = ?rewritten, "rewrote redirect target");
                headers.insert(header::LOCATION, rewritten);
            }
            None => debug!(%original, "redirect target left untouched"),
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, message).into_response()
}

/// Cross-origin policy shared by every route
///
/// Preflights are answered here and never reach an upstream node.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            header::CACHE_CONTROL,
            header::PRAGMA,
            header::EXPIRES,
            header::CONTENT_LENGTH,
        ])
        .expose_headers([
            header::LOCATION,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::DATE,
            header::SERVER,
            header::CACHE_CONTROL,
            header::PRAGMA,
            header::EXPIRES,
            header::ETAG,
        ])
        .max_age(Duration::from_secs(86400))
}

async fn relay_handler(
    State(state): State<Arc<RelayState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((route, base)) = state.route(uri.path()) else {
        return error_response(StatusCode::NOT_FOUND, format!("No relay route for {}", uri.path()));
    };

    let target = match uri.query() {
        Some(query) => format!("{}?{}", base, query),
        None => base,
    };
    info!(?route, %method, %target, "relaying");

    match state.forward(route, &method, &target, &headers, body).await {
        Ok(response) => response,
        Err(e) => {
            error!(?route, %target, error = %e, "relay error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Relay error: {}", e))
        }
    }
}

/// Build the relay's router
pub fn router(state: Arc<RelayState>) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route(UPLOAD_ROUTE, post(upload::upload_handler))
        .fallback(relay_handler)
        .layer(DefaultBodyLimit::max(limit))
        .layer(cors_layer())
        .with_state(state)
}
