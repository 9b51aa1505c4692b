//! Per-client connection state.

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use huddle_auth::Identity;
use huddle_core::{ConnectionId, RoomId, UserId};

/// Outcome of handing a payload to a connection's outbound queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Enqueued for the writer.
    Queued,
    /// The queue was full; the payload was dropped.
    Full,
    /// The writer is gone.
    Closed,
}

/// One live, authenticated client.
///
/// Owns the only sender of its outbound queue. Once the hub drops the
/// connection the writer sees the queue close and exits.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    room: RoomId,
    tx: mpsc::Sender<Utf8Bytes>,
    dropped: u64,
}

impl Connection {
    /// Create a connection and the receiving half of its outbound queue.
    pub fn new(
        id: ConnectionId,
        identity: Identity,
        room: RoomId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id,
            identity,
            room,
            tx,
            dropped: 0,
        };
        (conn, rx)
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Room this connection belongs to.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Authenticated user.
    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// Name attached to messages from this connection.
    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    /// Non-blocking enqueue. A full queue drops `payload` and bumps the
    /// drop counter.
    pub fn deliver(&mut self, payload: Utf8Bytes) -> Delivery {
        match self.tx.try_send(payload) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Delivery::Full
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Total payloads dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (Connection, mpsc::Receiver<Utf8Bytes>) {
        let identity = Identity {
            user_id: UserId(1),
            display_name: "ana".into(),
        };
        Connection::new(ConnectionId::from("conn_1"), identity, RoomId::from("lobby"), capacity)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.id().as_str(), "conn_1");
        assert_eq!(conn.room().as_str(), "lobby");
        assert_eq!(conn.user_id(), UserId(1));
        assert_eq!(conn.display_name(), "ana");
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn deliver_queues() {
        let (mut conn, mut rx) = make_connection(4);
        assert_eq!(conn.deliver("hello".into()), Delivery::Queued);
        assert_eq!(rx.recv().await.unwrap().as_str(), "hello");
    }

    #[test]
    fn full_queue_drops_newest() {
        let (mut conn, mut rx) = make_connection(1);
        assert_eq!(conn.deliver("first".into()), Delivery::Queued);
        assert_eq!(conn.deliver("second".into()), Delivery::Full);
        assert_eq!(conn.deliver("third".into()), Delivery::Full);
        assert_eq!(conn.drop_count(), 2);
        assert_eq!(rx.try_recv().unwrap().as_str(), "first");
    }

    #[test]
    fn closed_queue_not_counted_as_drop() {
        let (mut conn, rx) = make_connection(1);
        drop(rx);
        assert_eq!(conn.deliver("hello".into()), Delivery::Closed);
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn dropping_connection_closes_queue() {
        let (conn, mut rx) = make_connection(1);
        drop(conn);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (mut conn, _rx) = make_connection(0);
        assert_eq!(conn.deliver("x".into()), Delivery::Queued);
    }
}
