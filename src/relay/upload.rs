//! Privileged upload endpoint
//!
//! Accepts a multipart form with a `file` part and an `hdfsPath` directory
//! field, then performs the two-hop write itself with the relay's
//! credentials. Browsers that cannot follow the data-node redirect use this
//! instead of the raw relay routes.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    error::{HdfsError, Result},
    path::HdfsPath,
    remote::RemoteFs,
    types::UploadIntent,
};

use super::RelayState;

pub const UPLOAD_ROUTE: &str = "/upload-to-hdfs-via-server";
pub const FILE_FIELD: &str = "file";
pub const DIRECTORY_FIELD: &str = "hdfsPath";

/// JSON body of every upload answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReply {
    pub message: String,
}

fn reply(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(UploadReply {
            message: message.into(),
        }),
    )
        .into_response()
}

/// Whitespace in uploaded names is replaced so the stored path needs no quoting
pub fn sanitize_file_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

struct UploadForm {
    file_name: String,
    payload: Bytes,
    directory: String,
}

async fn read_form(mut multipart: Multipart) -> std::result::Result<UploadForm, String> {
    let mut file: Option<(String, Bytes)> = None;
    let mut directory: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Malformed upload form: {}", e))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let name = field.file_name().unwrap_or_default().to_string();
                let payload = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Could not read uploaded file: {}", e))?;
                file = Some((name, payload));
            }
            Some(DIRECTORY_FIELD) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| format!("Could not read {}: {}", DIRECTORY_FIELD, e))?;
                directory = Some(value);
            }
            _ => {}
        }
    }

    let (file_name, payload) = file
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| "No file uploaded.".to_string())?;
    let directory = directory
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| format!("{} is required.", DIRECTORY_FIELD))?;

    Ok(UploadForm {
        file_name,
        payload,
        directory,
    })
}

pub(crate) async fn upload_handler(
    State(state): State<Arc<RelayState>>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(message) => {
            warn!(%message, "rejected upload");
            return reply(StatusCode::BAD_REQUEST, message);
        }
    };

    let file_name = sanitize_file_name(&form.file_name);
    let intent = UploadIntent::new(HdfsPath::new(&form.directory), &file_name, form.payload);
    let size = intent.payload.len();

    match state.uploader().upload(intent).await {
        Ok(target) => {
            info!(path = %target, bytes = size, "relay upload complete");
            reply(
                StatusCode::OK,
                format!("File {} uploaded successfully to {}", file_name, target),
            )
        }
        Err(e) => {
            error!(file = %file_name, error = %e, "relay upload failed");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Upload failed: {}", e),
            )
        }
    }
}

/// Upload through a relay's privileged endpoint
///
/// Returns the relay's message on success.
pub async fn upload_via_relay(
    base_url: &str,
    directory: &HdfsPath,
    file_name: &str,
    payload: Bytes,
) -> Result<String> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), UPLOAD_ROUTE);
    let part = Part::bytes(payload.to_vec())
        .file_name(file_name.to_string())
        .mime_str(crate::mime::resolve(file_name))
        .map_err(|e| HdfsError::transport(url.as_str(), e))?;
    let form = Form::new()
        .part(FILE_FIELD, part)
        .text(DIRECTORY_FIELD, directory.to_string());

    let response = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| HdfsError::transport(url.as_str(), e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| HdfsError::transport(url.as_str(), e))?;
    let message = serde_json::from_str::<UploadReply>(&body)
        .map(|r| r.message)
        .unwrap_or(body);

    if status.is_success() {
        Ok(message)
    } else {
        Err(HdfsError::RelayUpload {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my report.csv"), "my_report.csv");
        assert_eq!(sanitize_file_name("a  b\tc.txt"), "a_b_c.txt");
        assert_eq!(sanitize_file_name("plain.txt"), "plain.txt");
    }
}
