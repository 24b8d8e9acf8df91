//! REST handlers.
//!
//! Implements:
//! - GET /health, GET /api/status, POST /api/connect
//! - file listing, download, info, upload, delete and directory creation
//! - GET /api/tools (capability discovery)
//! - queue and stream pass-through routes

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use files_bridge_core::{FileInfo, Folder, FolderListing, ToolInfo, UploadRequest};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::extract::JsonBody;
use crate::message::{
    ConnectResponse, CreateDirectoryRequest, FileRef, FolderQuery, MutationResponse,
    StatusResponse,
};
use crate::mime::content_type_for;
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.status())
}

/// POST /api/connect
pub async fn connect_handler(State(state): State<AppState>) -> Result<Json<ConnectResponse>> {
    Ok(Json(state.connect().await?))
}

/// GET /api/files?folder=
pub async fn list_files_handler(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<FolderListing>> {
    Ok(Json(state.client.list_files(query.folder()).await?))
}

/// GET /api/images
pub async fn list_images_handler(State(state): State<AppState>) -> Result<Json<FolderListing>> {
    Ok(Json(state.client.list_images().await?))
}

/// GET /api/videos
pub async fn list_videos_handler(State(state): State<AppState>) -> Result<Json<FolderListing>> {
    Ok(Json(state.client.list_videos().await?))
}

/// Decode a base64 body, tolerating line breaks and a `data:` URL prefix.
pub(crate) fn decode_content(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => encoded,
    };
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| BridgeError::Decode(e.to_string()))
}

/// GET /api/file/{folder}/{filename}
///
/// Streams the decoded file with a content type inferred from the extension.
pub async fn download_handler(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Response> {
    let folder = Folder::from(folder.as_str());
    let encoded = state.client.download_file(&folder, &filename).await?;
    let bytes = decode_content(&encoded)?;
    let content_type = content_type_for(&filename);
    let length = bytes.len();

    debug!(
        "Serving {}/{} ({} bytes, {})",
        folder, filename, length, content_type
    );

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    let disposition = format!("inline; filename=\"{}\"", filename.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// GET /api/file/{folder}/{filename}/info
pub async fn file_info_handler(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Json<FileInfo>> {
    let folder = Folder::from(folder.as_str());
    Ok(Json(state.client.get_file_info(&folder, &filename).await?))
}

/// POST /api/upload
pub async fn upload_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UploadRequest>,
) -> Result<Json<MutationResponse>> {
    let message = state.upload(&request).await?;
    Ok(Json(MutationResponse {
        success: true,
        message,
    }))
}

/// DELETE /api/file/{folder}/{filename}
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Json<MutationResponse>> {
    let folder = Folder::from(folder.as_str());
    let message = state.delete(&folder, &filename).await?;
    Ok(Json(MutationResponse {
        success: true,
        message,
    }))
}

/// POST /api/directories
pub async fn create_directory_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateDirectoryRequest>,
) -> Result<Json<MutationResponse>> {
    let message = state.client.create_directory(&request.name).await?;
    Ok(Json(MutationResponse {
        success: true,
        message,
    }))
}

#[derive(Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolInfo>,
}

/// GET /api/tools
pub async fn tools_handler(State(state): State<AppState>) -> Result<Json<ToolsResponse>> {
    let tools = state.client.list_tools().await?;
    Ok(Json(ToolsResponse { tools }))
}

/// GET /api/queue
pub async fn queue_status_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.client.get_queue_status().await?))
}

/// POST /api/queue/join
pub async fn join_queue_handler(
    State(state): State<AppState>,
    JsonBody(file): JsonBody<FileRef>,
) -> Result<Json<Value>> {
    Ok(Json(
        state
            .client
            .join_download_queue(&file.folder, &file.filename)
            .await?,
    ))
}

/// GET /api/queue/tickets/{ticket}
pub async fn check_ticket_handler(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.client.check_ticket(&ticket).await?))
}

/// GET /api/queue/downloads
pub async fn download_queue_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.client.get_download_queue_status().await?))
}

/// GET /api/streams
pub async fn active_streams_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.client.get_active_streams().await?))
}

/// POST /api/streams
pub async fn start_stream_handler(
    State(state): State<AppState>,
    JsonBody(file): JsonBody<FileRef>,
) -> Result<Json<Value>> {
    Ok(Json(
        state
            .client
            .start_stream(&file.folder, &file.filename)
            .await?,
    ))
}

/// DELETE /api/streams/{id}
pub async fn stop_stream_handler(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.client.stop_stream(&stream_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_tolerates_wrapping_and_data_urls() {
        assert_eq!(decode_content("aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_content("data:text/plain;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode_content("not base64!"),
            Err(BridgeError::Decode(_))
        ));
    }
}
