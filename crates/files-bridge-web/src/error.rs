//! Error types for the HTTP and WebSocket surfaces.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use files_bridge_core::ClientError;
use serde::Serialize;
use tracing::warn;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Failed to decode file content: {0}")]
    Decode(String),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<JsonRejection> for BridgeError {
    fn from(rejection: JsonRejection) -> Self {
        BridgeError::InvalidMessage(rejection.body_text())
    }
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::Client(ClientError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }

        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
