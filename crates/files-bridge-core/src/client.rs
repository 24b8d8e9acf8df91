//! Typed wrapper over the backend's tools.
//!
//! Every method checks for a live channel, calls one named tool with a JSON
//! argument object and interprets the first text payload of the result.

use std::sync::Arc;

use rmcp::model::CallToolResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{ClientError, Result};
use crate::model::{FileInfo, Folder, FolderListing, ToolInfo};

/// Which upload tool a file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum UploadKind {
    Image,
    Video,
    #[default]
    File,
}

impl From<String> for UploadKind {
    /// Accepts `image`, `video`, or a MIME type such as `image/png`.
    fn from(kind: String) -> Self {
        let kind = kind.to_ascii_lowercase();
        if kind.starts_with("image") {
            UploadKind::Image
        } else if kind.starts_with("video") {
            UploadKind::Video
        } else {
            UploadKind::File
        }
    }
}

impl UploadKind {
    fn tool(self) -> &'static str {
        match self {
            UploadKind::Image => "upload_image",
            UploadKind::Video => "upload_video",
            UploadKind::File => "upload_file",
        }
    }
}

/// Upload payload as sent by browsers: base64 content plus a kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    /// Base64-encoded file body, passed to the backend untouched.
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: UploadKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<Folder>,
}

/// Phrases the backend uses when a file lookup misses.
const NOT_FOUND_MARKERS: &[&str] = &["not found", "does not exist", "no such file", "enoent"];

/// First text payload of a tool result.
fn first_text(result: &CallToolResult) -> &str {
    result
        .content
        .iter()
        .find_map(|item| item.raw.as_text().map(|t| t.text.as_str()))
        .unwrap_or_default()
}

fn is_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m))
}

/// One method per backend capability.
#[derive(Clone)]
pub struct FileClient {
    connection: Arc<Connection>,
}

impl FileClient {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Call a tool and return its text payload.
    async fn call_text(&self, tool: &str, arguments: Value) -> Result<String> {
        let transport = self.connection.transport().await?;
        debug!("Calling tool {} with {}", tool, arguments);
        let result = transport.call_tool(tool, arguments).await?;
        let text = first_text(&result).to_string();

        if result.is_error == Some(true) {
            return Err(if is_not_found(&text) {
                ClientError::NotFound(text)
            } else {
                ClientError::Tool(text)
            });
        }
        Ok(text)
    }

    /// Call a tool whose text payload is JSON.
    async fn call_json(&self, tool: &str, arguments: Value) -> Result<Value> {
        let text = self.call_text(tool, arguments).await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn listing(&self, tool: &str, arguments: Value, folder: Folder) -> Result<FolderListing> {
        let value = self.call_json(tool, arguments).await?;
        Ok(FolderListing::from_value(folder, value)?)
    }

    pub async fn list_files(&self, folder: Folder) -> Result<FolderListing> {
        let arguments = match folder {
            Folder::All => json!({}),
            ref other => json!({ "folder": other }),
        };
        self.listing("list_files", arguments, folder).await
    }

    pub async fn list_images(&self) -> Result<FolderListing> {
        self.listing("list_images", json!({}), Folder::Images).await
    }

    pub async fn list_videos(&self) -> Result<FolderListing> {
        self.listing("list_videos", json!({}), Folder::Videos).await
    }

    pub async fn upload(&self, request: &UploadRequest) -> Result<String> {
        let mut arguments = json!({
            "filename": request.filename,
            "content": request.content,
        });
        if let Some(folder) = &request.folder {
            arguments["folder"] = json!(folder);
        }
        self.call_text(request.kind.tool(), arguments).await
    }

    /// Base64 body of a file.
    ///
    /// The backend answers either with the bare base64 text or with a JSON
    /// object carrying it under `content`.
    pub async fn download_file(&self, folder: &Folder, filename: &str) -> Result<String> {
        let text = self
            .call_text(
                "download_file",
                json!({ "folder": folder, "filename": filename }),
            )
            .await?;

        if text.trim_start().starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) {
                if let Some(Value::String(content)) = map.get("content") {
                    return Ok(content.clone());
                }
            }
        }
        Ok(text.trim().to_string())
    }

    pub async fn delete_file(&self, folder: &Folder, filename: &str) -> Result<String> {
        self.call_text(
            "delete_file",
            json!({ "folder": folder, "filename": filename }),
        )
        .await
    }

    pub async fn get_file_info(&self, folder: &Folder, filename: &str) -> Result<FileInfo> {
        let value = self
            .call_json(
                "get_file_info",
                json!({ "folder": folder, "filename": filename }),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_directory(&self, name: &str) -> Result<String> {
        self.call_text("create_directory", json!({ "name": name }))
            .await
    }

    pub async fn get_queue_status(&self) -> Result<Value> {
        self.call_json("get_queue_status", json!({})).await
    }

    pub async fn join_download_queue(&self, folder: &Folder, filename: &str) -> Result<Value> {
        self.call_json(
            "join_download_queue",
            json!({ "folder": folder, "filename": filename }),
        )
        .await
    }

    pub async fn check_ticket(&self, ticket_id: &str) -> Result<Value> {
        self.call_json("check_ticket", json!({ "ticketId": ticket_id }))
            .await
    }

    pub async fn get_download_queue_status(&self) -> Result<Value> {
        self.call_json("get_download_queue_status", json!({})).await
    }

    pub async fn get_active_streams(&self) -> Result<Value> {
        self.call_json("get_active_streams", json!({})).await
    }

    pub async fn start_stream(&self, folder: &Folder, filename: &str) -> Result<Value> {
        self.call_json(
            "start_stream",
            json!({ "folder": folder, "filename": filename }),
        )
        .await
    }

    pub async fn stop_stream(&self, stream_id: &str) -> Result<Value> {
        self.call_json("stop_stream", json!({ "streamId": stream_id }))
            .await
    }

    /// Capability discovery.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let transport = self.connection.transport().await?;
        transport.list_tools().await
    }
}
