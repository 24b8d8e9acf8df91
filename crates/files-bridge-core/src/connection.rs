//! Lifecycle of the single backend channel.
//!
//! At most one live channel exists. Establishment is serialised so that
//! concurrent `connect()` callers queue behind the first and then observe
//! the channel it created.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::transport::{Connector, ToolTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What `connect()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Established,
    AlreadyConnected,
}

/// Exclusively-owned channel to the backend.
pub struct Connection {
    connector: Arc<dyn Connector>,
    channel: AsyncMutex<Option<Arc<dyn ToolTransport>>>,
    state: watch::Sender<ConnectionState>,
}

impl Connection {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            channel: AsyncMutex::new(None),
            state,
        }
    }

    pub fn server_path(&self) -> &str {
        self.connector.server_path()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish the channel unless one is already live.
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        let mut channel = self.channel.lock().await;

        if let Some(existing) = channel.as_ref() {
            if !existing.is_closed() {
                return Ok(ConnectOutcome::AlreadyConnected);
            }
            warn!("Previous MCP channel is closed, establishing a new one");
            *channel = None;
        }

        self.state.send_replace(ConnectionState::Connecting);
        info!("Connecting to MCP server at {}", self.server_path());

        match self.connector.connect().await {
            Ok(transport) => {
                *channel = Some(transport);
                self.state.send_replace(ConnectionState::Connected);
                info!("MCP server connected");
                Ok(ConnectOutcome::Established)
            }
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                warn!("Failed to connect to MCP server: {}", e);
                Err(e)
            }
        }
    }

    /// Close the channel (if any) and report the final state.
    pub async fn disconnect(&self) -> ConnectionState {
        let taken = self.channel.lock().await.take();
        if let Some(transport) = taken {
            transport.close().await;
            info!("Disconnected from MCP server");
        }
        self.state.send_replace(ConnectionState::Disconnected);
        self.state()
    }

    /// The live channel, or `NotConnected`.
    ///
    /// A channel whose process went away is dropped here; the caller must
    /// `connect()` again explicitly.
    pub async fn transport(&self) -> Result<Arc<dyn ToolTransport>> {
        let mut channel = self.channel.lock().await;
        match channel.as_ref() {
            Some(transport) if !transport.is_closed() => Ok(transport.clone()),
            Some(_) => {
                warn!("MCP server channel was lost");
                *channel = None;
                self.state.send_replace(ConnectionState::Disconnected);
                Err(ClientError::NotConnected)
            }
            None => Err(ClientError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::model::ToolInfo;
    use rmcp::model::{CallToolResult, Content};

    #[derive(Default)]
    struct StubTransport {
        closed: AtomicBool,
    }

    #[async_trait]
    impl ToolTransport for StubTransport {
        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<CallToolResult> {
            Ok(CallToolResult::success(vec![Content::text(name)]))
        }

        async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
            Ok(Vec::new())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self) -> Result<Arc<dyn ToolTransport>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Transport("spawn refused".to_string()));
            }
            Ok(Arc::new(StubTransport::default()))
        }

        fn server_path(&self) -> &str {
            "stub-server.js"
        }
    }

    #[tokio::test]
    async fn test_sequential_connect_is_idempotent() {
        let connector = Arc::new(CountingConnector::default());
        let connection = Connection::new(connector.clone());

        assert_eq!(connection.connect().await.unwrap(), ConnectOutcome::Established);
        assert_eq!(
            connection.connect().await.unwrap(),
            ConnectOutcome::AlreadyConnected
        );
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(connection.is_connected());
    }

    #[tokio::test]
    async fn test_concurrent_connect_establishes_one_channel() {
        let connector = Arc::new(CountingConnector::default());
        let connection = Arc::new(Connection::new(connector.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let connection = connection.clone();
            handles.push(tokio::spawn(async move { connection.connect().await }));
        }

        let mut established = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == ConnectOutcome::Established {
                established += 1;
            }
        }

        assert_eq!(established, 1);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_disconnected() {
        let connector = Arc::new(CountingConnector::default());
        connector.fail.store(true, Ordering::SeqCst);
        let connection = Connection::new(connector.clone());

        assert!(connection.connect().await.is_err());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(matches!(
            connection.transport().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_closes_channel() {
        let connection = Connection::new(Arc::new(CountingConnector::default()));
        connection.connect().await.unwrap();

        let transport = connection.transport().await.unwrap();
        assert_eq!(connection.disconnect().await, ConnectionState::Disconnected);
        assert!(transport.is_closed());
        assert!(matches!(
            connection.transport().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_lost_channel_requires_explicit_reconnect() {
        let connector = Arc::new(CountingConnector::default());
        let connection = Connection::new(connector.clone());
        connection.connect().await.unwrap();

        connection.transport().await.unwrap().close().await;
        assert!(matches!(
            connection.transport().await,
            Err(ClientError::NotConnected)
        ));
        assert_eq!(connection.state(), ConnectionState::Disconnected);

        assert_eq!(connection.connect().await.unwrap(), ConnectOutcome::Established);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }
}
