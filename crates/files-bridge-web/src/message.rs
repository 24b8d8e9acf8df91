//! Wire shapes shared by the REST and WebSocket surfaces.

use files_bridge_core::{ConnectionState, Folder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound WebSocket message.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// Outbound WebSocket message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Response {
        action: String,
        result: Value,
    },
    Error {
        action: Option<String>,
        message: String,
    },
    Status {
        connected: bool,
    },
    FileChanged {
        action: ChangeKind,
        filename: String,
    },
}

/// Mutations that trigger a `file_changed` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Upload,
    Delete,
}

/// A file addressed by folder and name.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub folder: Folder,
    pub filename: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub folder: Option<String>,
}

impl FolderQuery {
    /// Missing or empty folder means every folder.
    pub fn folder(&self) -> Folder {
        match self.folder.as_deref() {
            None | Some("") => Folder::All,
            Some(name) => Folder::from(name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDirectoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRef {
    pub ticket_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRef {
    pub stream_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    pub state: ConnectionState,
    pub server_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub success: bool,
    pub connected: bool,
    pub already_connected: bool,
}

/// Reply to upload, delete and directory creation.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
}
