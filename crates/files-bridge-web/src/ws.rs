//! WebSocket surface.
//!
//! Each session forwards `{action, payload}` messages to the file client and
//! relays broadcast pushes. A failed message produces an error envelope; the
//! socket stays open.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use files_bridge_core::{Folder, UploadRequest};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::message::{
    ClientMessage, CreateDirectoryRequest, FileRef, ServerMessage, StreamRef, TicketRef,
};
use crate::mime::content_type_for;
use crate::state::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Requests a session may queue while its worker is busy.
const MAX_PENDING_REQUESTS: usize = 32;

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.broadcaster.subscribe();
    let mut shutdown = state.shutdown.clone();

    info!(
        "WebSocket client connected ({} open)",
        state.broadcaster.subscribers()
    );

    let hello = ServerMessage::Status {
        connected: state.connection().is_connected(),
    };
    if send(&mut sender, &hello).await.is_err() {
        return;
    }

    // Backend calls run on a worker so a slow call never blocks pushes or
    // shutdown. Requests are answered in arrival order.
    let (request_tx, mut request_rx) = mpsc::channel::<String>(MAX_PENDING_REQUESTS);
    let (reply_tx, mut replies) = mpsc::channel::<ServerMessage>(MAX_PENDING_REQUESTS);
    let worker_state = state.clone();
    let worker = tokio::spawn(async move {
        while let Some(text) = request_rx.recv().await {
            let reply = handle_text(&worker_state, &text).await;
            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if request_tx.try_send(text.to_string()).is_err() {
                        let busy = ServerMessage::Error {
                            action: None,
                            message: "Too many requests in flight".to_string(),
                        };
                        if send(&mut sender, &busy).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
            Some(reply) = replies.recv() => {
                if send(&mut sender, &reply).await.is_err() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(message) => {
                    if send(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client fell behind, {} notification(s) dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    worker.abort();
    drop(events);
    info!(
        "WebSocket client disconnected ({} open)",
        state.broadcaster.subscribers()
    );
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> std::result::Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode WebSocket message: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

/// Turn one inbound text frame into its reply envelope.
pub async fn handle_text(state: &AppState, text: &str) -> ServerMessage {
    let request: ClientMessage = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            return ServerMessage::Error {
                action: None,
                message: BridgeError::InvalidMessage(e.to_string()).to_string(),
            }
        }
    };

    match dispatch(state, &request.action, request.payload).await {
        Ok(result) => ServerMessage::Response {
            action: request.action,
            result,
        },
        Err(e) => {
            debug!("WebSocket action {} failed: {}", request.action, e);
            ServerMessage::Error {
                action: Some(request.action),
                message: e.to_string(),
            }
        }
    }
}

#[derive(Deserialize)]
struct FolderPayload {
    #[serde(default)]
    folder: Option<Folder>,
}

fn payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    let payload = if payload.is_null() { json!({}) } else { payload };
    serde_json::from_value(payload).map_err(|e| BridgeError::InvalidMessage(e.to_string()))
}

/// Route an action name to the matching client operation.
pub async fn dispatch(state: &AppState, action: &str, body: Value) -> Result<Value> {
    let client = &state.client;

    let result = match action {
        "status" => serde_json::to_value(state.status())?,
        "connect" => serde_json::to_value(state.connect().await?)?,
        "listTools" => {
            let tools = client.list_tools().await?;
            json!({ "tools": tools })
        }
        "listFiles" => {
            let request: FolderPayload = payload(body)?;
            let folder = request.folder.unwrap_or(Folder::All);
            serde_json::to_value(client.list_files(folder).await?)?
        }
        "listImages" => serde_json::to_value(client.list_images().await?)?,
        "listVideos" => serde_json::to_value(client.list_videos().await?)?,
        "uploadFile" => {
            let request: UploadRequest = payload(body)?;
            let message = state.upload(&request).await?;
            json!({ "success": true, "message": message, "filename": request.filename })
        }
        "downloadFile" => {
            let file: FileRef = payload(body)?;
            let content = client.download_file(&file.folder, &file.filename).await?;
            let mime_type = content_type_for(&file.filename);
            json!({
                "filename": file.filename,
                "mimeType": mime_type,
                "content": content,
            })
        }
        "deleteFile" => {
            let file: FileRef = payload(body)?;
            let message = state.delete(&file.folder, &file.filename).await?;
            json!({ "success": true, "message": message, "filename": file.filename })
        }
        "getFileInfo" => {
            let file: FileRef = payload(body)?;
            serde_json::to_value(client.get_file_info(&file.folder, &file.filename).await?)?
        }
        "createDirectory" => {
            let request: CreateDirectoryRequest = payload(body)?;
            let message = client.create_directory(&request.name).await?;
            json!({ "success": true, "message": message })
        }
        "getQueueStatus" => client.get_queue_status().await?,
        "joinDownloadQueue" => {
            let file: FileRef = payload(body)?;
            client
                .join_download_queue(&file.folder, &file.filename)
                .await?
        }
        "checkTicket" => {
            let ticket: TicketRef = payload(body)?;
            client.check_ticket(&ticket.ticket_id).await?
        }
        "getDownloadQueueStatus" => client.get_download_queue_status().await?,
        "getActiveStreams" => client.get_active_streams().await?,
        "startStream" => {
            let file: FileRef = payload(body)?;
            client.start_stream(&file.folder, &file.filename).await?
        }
        "stopStream" => {
            let stream: StreamRef = payload(body)?;
            client.stop_stream(&stream.stream_id).await?
        }
        other => return Err(BridgeError::UnknownAction(other.to_string())),
    };

    Ok(result)
}
