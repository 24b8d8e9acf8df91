//! Fan-out of change notifications to open WebSocket sessions.
//!
//! Each session holds one receiver of a bounded broadcast channel. Delivery
//! is best effort: a receiver that falls behind loses the oldest messages,
//! and nothing is replayed to sessions that join later.

use tokio::sync::broadcast;
use tracing::debug;

use crate::message::{ChangeKind, ServerMessage};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct ChangeBroadcaster {
    tx: broadcast::Sender<ServerMessage>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Join the client set. Dropping the receiver leaves it.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Number of open subscribers.
    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Push `{type: "file_changed"}`; returns how many sessions it reached.
    pub fn file_changed(&self, action: ChangeKind, filename: &str) -> usize {
        self.publish(ServerMessage::FileChanged {
            action,
            filename: filename.to_string(),
        })
    }

    /// Push `{type: "status"}`.
    pub fn status(&self, connected: bool) -> usize {
        self.publish(ServerMessage::Status { connected })
    }

    fn publish(&self, message: ServerMessage) -> usize {
        // Err only means nobody is listening.
        match self.tx.send(message) {
            Ok(delivered) => {
                debug!("Broadcast to {} WebSocket client(s)", delivered);
                delivered
            }
            Err(_) => 0,
        }
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[tokio::test]
    async fn test_open_subscribers_get_exactly_one_copy() {
        let broadcaster = ChangeBroadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        let closed = broadcaster.subscribe();
        drop(closed);

        assert_eq!(broadcaster.file_changed(ChangeKind::Delete, "a.png"), 2);

        let expected = ServerMessage::FileChanged {
            action: ChangeKind::Delete,
            filename: "a.png".to_string(),
        };
        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap(), expected);
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let broadcaster = ChangeBroadcaster::new();
        assert_eq!(broadcaster.status(true), 0);

        let mut late = broadcaster.subscribe();
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(broadcaster.subscribers(), 1);
    }

    #[tokio::test]
    async fn test_saturated_subscriber_drops_oldest() {
        let broadcaster = ChangeBroadcaster::with_capacity(2);
        let mut slow = broadcaster.subscribe();

        for name in ["1", "2", "3"] {
            broadcaster.file_changed(ChangeKind::Upload, name);
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(1))));
        let next = slow.recv().await.unwrap();
        assert_eq!(
            next,
            ServerMessage::FileChanged {
                action: ChangeKind::Upload,
                filename: "2".to_string(),
            }
        );
    }
}
