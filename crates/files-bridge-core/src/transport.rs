//! MCP stdio transport.
//!
//! The backend is an MCP server speaking over its stdin/stdout. `rmcp` runs
//! the handshake and matches responses to requests, so calls from many
//! HTTP/WebSocket handlers can be in flight on the same channel at once.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::{RunningService, ServiceError};
use rmcp::transport::{IntoTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::model::ToolInfo;

/// A live channel to the backend that can invoke named tools.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Invoke a tool with a JSON argument object.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult>;

    /// Capability discovery.
    async fn list_tools(&self) -> Result<Vec<ToolInfo>>;

    /// True once the channel can no longer carry calls.
    fn is_closed(&self) -> bool;

    /// Tear the channel down. Safe to call more than once.
    async fn close(&self);
}

/// Establishes a fresh channel to the backend.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ToolTransport>>;

    /// What the connector launches, for status reporting.
    fn server_path(&self) -> &str;
}

/// How to launch the backend process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub server_path: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.server_path)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);
        cmd
    }
}

/// Launches the backend as a child process for every `connect()`.
pub struct ProcessConnector {
    spec: ProcessSpec,
}

impl ProcessConnector {
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Connector for ProcessConnector {
    async fn connect(&self) -> Result<Arc<dyn ToolTransport>> {
        let session = McpSession::spawn(&self.spec).await?;
        Ok(Arc::new(session))
    }

    fn server_path(&self) -> &str {
        &self.spec.server_path
    }
}

fn service_error(e: ServiceError) -> ClientError {
    match e {
        ServiceError::McpError(error) => ClientError::Transport(error.message.to_string()),
        other => ClientError::Transport(other.to_string()),
    }
}

/// Initialised MCP client session over some byte transport, usually the
/// child process it launched.
pub struct McpSession {
    service: RunningService<RoleClient, ()>,
    closed: AtomicBool,
}

impl McpSession {
    /// Run the MCP handshake over any transport `rmcp` can drive.
    pub async fn start<T, E, A>(transport: T) -> Result<Self>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| ClientError::Transport(format!("MCP handshake failed: {}", e)))?;
        debug!("MCP handshake complete");

        Ok(Self {
            service,
            closed: AtomicBool::new(false),
        })
    }

    /// Launch the backend process and complete the MCP handshake.
    pub async fn spawn(spec: &ProcessSpec) -> Result<Self> {
        info!(
            "Launching MCP server: {} {}",
            spec.program, spec.server_path
        );

        let (transport, stderr) = TokioChildProcess::builder(spec.command())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ClientError::Spawn)?;

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "backend", "{}", line);
                }
            });
        }

        let session = Self::start(transport).await?;
        info!("Connected to MCP server {}", spec.server_path);
        Ok(session)
    }
}

#[async_trait]
impl ToolTransport for McpSession {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(ClientError::Tool(format!(
                    "Arguments for {} must be an object, got {}",
                    name, other
                )))
            }
        };

        self.service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await
            .map_err(service_error)
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let tools = self.service.list_all_tools().await.map_err(service_error)?;
        Ok(tools.into_iter().map(ToolInfo::from).collect())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.service.is_transport_closed()
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.service.cancellation_token().cancel();
            info!("MCP session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    /// Minimal line-delimited MCP server on the far end of a duplex pipe.
    ///
    /// Returns every message it received once the client hangs up. A call
    /// to the `hang_up` tool makes it drop the pipe without answering.
    fn spawn_fake_server(stream: DuplexStream) -> JoinHandle<Vec<Value>> {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(stream);
            let mut lines = BufReader::new(read).lines();
            let mut seen = Vec::new();

            while let Ok(Some(line)) = lines.next_line().await {
                let message: Value = serde_json::from_str(&line).unwrap();
                let method = message["method"].as_str().unwrap_or_default().to_string();
                let result = match method.as_str() {
                    "initialize" => Some(json!({
                        "protocolVersion": message["params"]["protocolVersion"],
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "fake-files", "version": "0.0.1"}
                    })),
                    "tools/list" => Some(json!({
                        "tools": [
                            {"name": "list_files", "description": "List files",
                             "inputSchema": {"type": "object"}},
                            {"name": "start_stream", "inputSchema": {"type": "object"}}
                        ]
                    })),
                    "tools/call" if message["params"]["name"] == "hang_up" => {
                        seen.push(message);
                        break;
                    }
                    "tools/call" => Some(json!({
                        "content": [{
                            "type": "text",
                            "text": format!(
                                "{} {}",
                                message["params"]["name"].as_str().unwrap(),
                                message["params"]["arguments"]
                            )
                        }],
                        "isError": false
                    })),
                    _ => None,
                };

                if let (Some(result), Some(id)) = (result, message.get("id")) {
                    let mut reply =
                        json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string();
                    reply.push('\n');
                    write.write_all(reply.as_bytes()).await.unwrap();
                }
                seen.push(message);
            }
            seen
        })
    }

    async fn session_pair() -> (McpSession, JoinHandle<Vec<Value>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server_task = spawn_fake_server(server);
        let session = McpSession::start(client).await.unwrap();
        (session, server_task)
    }

    fn text_of(result: &CallToolResult) -> &str {
        result
            .content
            .iter()
            .find_map(|item| item.raw.as_text().map(|t| t.text.as_str()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_then_tool_call() {
        let (session, server_task) = session_pair().await;

        let result = session
            .call_tool("list_files", json!({"folder": "IMAGES"}))
            .await
            .unwrap();
        assert_eq!(text_of(&result), r#"list_files {"folder":"IMAGES"}"#);
        assert_ne!(result.is_error, Some(true));

        session.close().await;
        assert!(session.is_closed());

        let seen = server_task.await.unwrap();
        let methods: Vec<&str> = seen.iter().filter_map(|m| m["method"].as_str()).collect();
        assert_eq!(methods[..2].to_vec(), vec!["initialize", "notifications/initialized"]);
        assert!(methods.contains(&"tools/call"));
    }

    #[tokio::test]
    async fn test_overlapping_calls_each_get_their_answer() {
        let (session, _server_task) = session_pair().await;

        let (a, b) = tokio::join!(
            session.call_tool("list_images", json!({})),
            session.call_tool("list_videos", json!({}))
        );
        assert_eq!(text_of(&a.unwrap()), "list_images {}");
        assert_eq!(text_of(&b.unwrap()), "list_videos {}");
    }

    #[tokio::test]
    async fn test_list_tools_maps_descriptors() {
        let (session, _server_task) = session_pair().await;

        let tools = session.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_files", "start_stream"]);
        assert_eq!(tools[0].description.as_deref(), Some("List files"));
        assert_eq!(tools[0].input_schema, Some(json!({"type": "object"})));
    }

    #[tokio::test]
    async fn test_server_hang_up_closes_channel() {
        let (session, server_task) = session_pair().await;

        let unanswered = tokio::time::timeout(
            Duration::from_secs(5),
            session.call_tool("hang_up", json!({})),
        )
        .await;
        assert!(!matches!(unanswered, Ok(Ok(_))));
        server_task.await.unwrap();

        for _ in 0..100 {
            if session.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(session.is_closed());
        assert!(session.call_tool("list_files", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_non_object_arguments_are_rejected() {
        let (session, _server_task) = session_pair().await;

        let err = session.call_tool("list_files", json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, ClientError::Tool(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let connector = ProcessConnector::new(ProcessSpec {
            program: "/nonexistent/files-bridge-backend".to_string(),
            server_path: "index.js".to_string(),
            args: Vec::new(),
            env: vec![("STORAGE_DIR".to_string(), "/tmp/storage".to_string())],
        });

        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, ClientError::Spawn(_)));
        assert_eq!(connector.server_path(), "index.js");
    }
}
