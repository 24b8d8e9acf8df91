//! Error types for the MCP file client.

/// Errors raised while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Not connected to MCP server")]
    NotConnected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Transport(String),

    #[error("Tool call failed: {0}")]
    Tool(String),

    #[error("Invalid JSON from MCP server: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to launch MCP server: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
