//! HTTP, WebSocket and browser front door for an MCP file server.
//!
//! This crate:
//! - Exposes the backend's file tools as REST endpoints under `/api`
//! - Accepts `{action, payload}` messages on `/ws` and answers with envelopes
//! - Pushes `file_changed` / `status` notifications to every open socket
//! - Serves a single static page at `/`

pub mod broadcast;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod message;
pub mod mime;
pub mod state;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use broadcast::ChangeBroadcaster;
pub use config::Config;
pub use error::BridgeError;
pub use state::AppState;

use handlers::{
    active_streams_handler, check_ticket_handler, connect_handler, create_directory_handler,
    delete_handler, download_handler, download_queue_handler, file_info_handler,
    health_handler, index_handler, join_queue_handler, list_files_handler,
    list_images_handler, list_videos_handler, queue_status_handler, start_stream_handler,
    status_handler, stop_stream_handler, tools_handler, upload_handler,
};
use ws::ws_handler;

/// Build the full router around shared state.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/status", get(status_handler))
        .route("/api/connect", post(connect_handler))
        .route("/api/files", get(list_files_handler))
        .route("/api/images", get(list_images_handler))
        .route("/api/videos", get(list_videos_handler))
        .route(
            "/api/file/{folder}/{filename}",
            get(download_handler).delete(delete_handler),
        )
        .route("/api/file/{folder}/{filename}/info", get(file_info_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/directories", post(create_directory_handler))
        .route("/api/tools", get(tools_handler))
        .route("/api/queue", get(queue_status_handler))
        .route("/api/queue/join", post(join_queue_handler))
        .route("/api/queue/tickets/{ticket}", get(check_ticket_handler))
        .route("/api/queue/downloads", get(download_queue_handler))
        .route(
            "/api/streams",
            get(active_streams_handler).post(start_stream_handler),
        )
        .route("/api/streams/{id}", delete(stop_stream_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
