use std::sync::Arc;

use files_bridge_core::{
    ConnectOutcome, Connection, ConnectionState, FileClient, Folder, UploadRequest,
};
use tokio::sync::watch;
use tracing::info;

use crate::broadcast::ChangeBroadcaster;
use crate::error::Result;
use crate::message::{ChangeKind, ConnectResponse, StatusResponse};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: FileClient,
    pub broadcaster: ChangeBroadcaster,
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(connection: Arc<Connection>) -> Self {
        // Sender dropped: sessions never see a shutdown unless `with_shutdown` is used.
        let (_, shutdown) = watch::channel(false);
        Self {
            client: FileClient::new(connection),
            broadcaster: ChangeBroadcaster::new(),
            shutdown,
        }
    }

    /// Close WebSocket sessions when the receiver flips to `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn connection(&self) -> &Arc<Connection> {
        self.client.connection()
    }

    pub fn status(&self) -> StatusResponse {
        let connection = self.connection();
        StatusResponse {
            connected: connection.is_connected(),
            state: connection.state(),
            server_path: connection.server_path().to_string(),
        }
    }

    pub async fn connect(&self) -> Result<ConnectResponse> {
        let outcome = self.connection().connect().await?;
        if outcome == ConnectOutcome::Established {
            self.broadcaster.status(true);
        }
        Ok(ConnectResponse {
            success: true,
            connected: true,
            already_connected: outcome == ConnectOutcome::AlreadyConnected,
        })
    }

    pub async fn disconnect(&self) -> ConnectionState {
        let final_state = self.connection().disconnect().await;
        self.broadcaster.status(false);
        final_state
    }

    /// Upload, then tell every open session.
    pub async fn upload(&self, request: &UploadRequest) -> Result<String> {
        let message = self.client.upload(request).await?;
        info!("Uploaded {} ({:?})", request.filename, request.kind);
        self.broadcaster
            .file_changed(ChangeKind::Upload, &request.filename);
        Ok(message)
    }

    /// Delete, then tell every open session.
    pub async fn delete(&self, folder: &Folder, filename: &str) -> Result<String> {
        let message = self.client.delete_file(folder, filename).await?;
        info!("Deleted {}/{}", folder, filename);
        self.broadcaster.file_changed(ChangeKind::Delete, filename);
        Ok(message)
    }
}
