//! Client side of the MCP file server bridge.
//!
//! This crate owns everything that talks to the backend process:
//! - `McpSession`: an `rmcp` client session over a child's stdio
//! - `Connection`: the single, exclusively-owned channel and its lifecycle
//! - `FileClient`: one typed method per backend tool
//! - `ToolTransport` / `Connector`: seams for substituting the backend in tests

mod client;
mod connection;
mod error;
mod model;
mod transport;

pub use client::{FileClient, UploadKind, UploadRequest};
pub use connection::{ConnectOutcome, Connection, ConnectionState};
pub use error::{ClientError, Result};
pub use model::{FileInfo, Folder, FolderListing, ToolInfo};
pub use rmcp::model::{CallToolResult, Content};
pub use transport::{Connector, McpSession, ProcessConnector, ProcessSpec, ToolTransport};
