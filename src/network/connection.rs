//! Connection Handle
//!
//! The reliable, ordered, message-oriented send primitive the core hands
//! around instead of raw sockets. Each live WebSocket gets one outbound
//! channel drained by its write pump; everything above the transport speaks
//! [`ServerMessage`] through this handle.

use tokio::sync::mpsc;
use tracing::debug;

use crate::network::protocol::ServerMessage;

/// Cloneable sender half of one participant connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its write pump drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a message, waiting for channel capacity.
    ///
    /// Delivery into the per-connection channel is ordered; returns false
    /// once the connection is gone.
    pub async fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }

    /// Best-effort queue without waiting. Used from synchronous registry
    /// code where a full or closed channel just drops the notice.
    pub fn notify(&self, message: ServerMessage) {
        if let Err(err) = self.tx.try_send(message) {
            debug!("dropping outbound notice: {err}");
        }
    }

    /// Whether the receiving side still exists.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_preserves_order() {
        let (conn, mut rx) = ConnectionHandle::channel(8);
        for i in 0..3 {
            assert!(
                conn.send(ServerMessage::Error {
                    message: format!("m{i}"),
                })
                .await
            );
        }
        for i in 0..3 {
            match rx.recv().await.unwrap() {
                ServerMessage::Error { message } => assert_eq!(message, format!("m{i}")),
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn closed_receiver_is_reported() {
        let (conn, rx) = ConnectionHandle::channel(1);
        assert!(conn.is_open());
        drop(rx);
        assert!(!conn.is_open());
        assert!(
            !conn
                .send(ServerMessage::Error {
                    message: "gone".into(),
                })
                .await
        );
    }

    #[tokio::test]
    async fn notify_never_blocks() {
        let (conn, _rx) = ConnectionHandle::channel(1);
        conn.notify(ServerMessage::Error { message: "a".into() });
        // Channel full: second notice is dropped, not awaited.
        conn.notify(ServerMessage::Error { message: "b".into() });
    }
}
