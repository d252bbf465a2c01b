//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use beacon_core::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::access::CallerIdentity;

/// Represents a connected WebSocket client.
///
/// The registry holds this behind an `Arc` keyed by [`ConnectionId`]; the
/// transport layer owns the socket itself.
pub struct ClientConnection {
    /// Opaque connection ID; the registry's key for this connection.
    pub id: ConnectionId,
    /// Authenticated identity of the caller, captured at upgrade time.
    pub identity: CallerIdentity,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the transport is still open. Flipped once on close; a
    /// closed connection is queued for eviction at the next broadcast.
    open: AtomicBool,
    /// Whether the client has responded since the last ping.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to a full channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection handle.
    pub fn new(id: ConnectionId, identity: CallerIdentity, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            identity,
            tx,
            connected_at: now,
            open: AtomicBool::new(true),
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Send a pre-serialized text frame to the client.
    ///
    /// Bounded and non-blocking: returns `false` if the channel is full or
    /// closed, incrementing the dropped-message counter. A `false` from a
    /// closed connection triggers eviction in the registry.
    pub fn send(&self, message: Arc<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_closed();
                false
            }
        }
    }

    /// Serialize a value and send it to the client.
    pub fn send_json<T: serde::Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether the transport is still open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Mark the transport closed.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Mark the connection as alive (pong or any inbound activity).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat loop.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(
            ConnectionId::from("conn_1"),
            CallerIdentity::from("user_1"),
            tx,
        );
        (conn, rx)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection();
        assert_eq!(conn.id.as_str(), "conn_1");
        assert_eq!(conn.identity.as_str(), "user_1");
        assert!(conn.is_open());
        assert!(conn.is_alive.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("hello".into())));
        let msg = rx.recv().await.unwrap();
        assert_eq!(&*msg, "hello");
    }

    #[tokio::test]
    async fn send_to_closed_channel_marks_connection_closed() {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(
            ConnectionId::from("conn_2"),
            CallerIdentity::from("user_1"),
            tx,
        );
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn send_to_full_channel_returns_false_and_counts_drop() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(
            ConnectionId::from("conn_3"),
            CallerIdentity::from("user_1"),
            tx,
        );
        assert!(conn.send(Arc::new("msg1".into())));
        // Channel is now full
        assert!(!conn.send(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
        // Still open — a full buffer is slowness, not death.
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn send_after_mark_closed_is_refused() {
        let (conn, mut rx) = make_connection();
        conn.mark_closed();
        assert!(!conn.send(Arc::new("late".into())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        assert!(!conn.check_alive(), "flag resets after check");
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[tokio::test]
    async fn send_json_serializes() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send_json(&serde_json::json!({"key": "value"})));
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection();
        let age1 = conn.age();
        std::thread::sleep(Duration::from_millis(10));
        assert!(conn.age() > age1);
    }

    #[tokio::test]
    async fn send_multiple_messages_in_order() {
        let (conn, mut rx) = make_connection();
        for i in 0..5 {
            assert!(conn.send(Arc::new(format!("msg_{i}"))));
        }
        for i in 0..5 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(&*msg, &format!("msg_{i}"));
        }
    }
}
