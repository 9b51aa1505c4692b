//! Room membership and fan-out.
//!
//! All membership changes and broadcasts flow through one FIFO intake and are
//! applied by a single control loop that exclusively owns the room mapping.
//! Handles ([`Hub`]) are cheap to clone and only ever enqueue events.

use std::collections::{BTreeMap, HashMap};

use axum::extract::ws::Utf8Bytes;
use metrics::counter;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::{ConnectionId, RoomId};

use crate::connection::{Connection, Delivery};
use crate::error::HubClosed;
use crate::metrics::{HUB_BROADCASTS_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// A message to fan out to one room.
#[derive(Clone, Debug)]
pub struct RoomMessage {
    /// Target room.
    pub room: RoomId,
    /// Text exactly as received.
    pub content: String,
    /// Sender display name.
    pub sender_name: String,
    /// Sending connection, excluded from delivery.
    pub sender: Option<ConnectionId>,
}

/// Outbound wire form of a [`RoomMessage`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload<'a> {
    /// Message text.
    pub content: &'a str,
    /// Sender display name.
    pub user_name: &'a str,
}

impl<'a> From<&'a RoomMessage> for ChatPayload<'a> {
    fn from(msg: &'a RoomMessage) -> Self {
        Self {
            content: &msg.content,
            user_name: &msg.sender_name,
        }
    }
}

/// Point-in-time membership counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubSnapshot {
    /// Registered connections across all rooms.
    pub connections: usize,
    /// Member count per non-empty room.
    pub rooms: BTreeMap<RoomId, usize>,
}

impl HubSnapshot {
    /// Members of `room`, zero when the room does not exist.
    pub fn room_size(&self, room: &RoomId) -> usize {
        self.rooms.get(room).copied().unwrap_or(0)
    }
}

/// Events accepted by the control loop, processed in arrival order.
#[derive(Debug)]
pub enum HubEvent {
    /// Add a connection to its room.
    Register(Connection),
    /// Remove a connection, closing its queue.
    Unregister(ConnectionId),
    /// Fan a message out to a room.
    Broadcast(RoomMessage),
    /// Report membership counts.
    Snapshot(oneshot::Sender<HubSnapshot>),
}

/// Per-broadcast delivery tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Targets that accepted the payload.
    pub delivered: usize,
    /// Targets whose queue was full.
    pub dropped: usize,
    /// Targets whose writer was already gone.
    pub closed: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Room → connections mapping with a reverse index.
///
/// A connection id is present in at most one room, at most once, and the
/// index always agrees with the room sets. Empty rooms are removed.
#[derive(Debug, Default)]
pub struct Rooms {
    rooms: HashMap<RoomId, HashMap<ConnectionId, Connection>>,
    index: HashMap<ConnectionId, RoomId>,
}

impl Rooms {
    /// Add a connection. If the id was already registered it is moved and
    /// the room it left is returned.
    pub fn insert(&mut self, conn: Connection) -> Option<RoomId> {
        let previous = self.remove(conn.id()).map(|old| old.room().clone());
        let id = conn.id().clone();
        let room = conn.room().clone();
        let _ = self.index.insert(id.clone(), room.clone());
        let _ = self.rooms.entry(room).or_default().insert(id, conn);
        previous
    }

    /// Remove a connection, returning it if present.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        let room = self.index.remove(id)?;
        let members = self.rooms.get_mut(&room)?;
        let conn = members.remove(id);
        if members.is_empty() {
            let _ = self.rooms.remove(&room);
        }
        conn
    }

    /// Deliver `payload` to every member of `msg.room` except the sender.
    ///
    /// Never blocks: full queues drop the payload for that target only.
    pub fn fan_out(&mut self, msg: &RoomMessage, payload: &Utf8Bytes) -> FanOut {
        let mut tally = FanOut::default();
        let Some(members) = self.rooms.get_mut(&msg.room) else {
            return tally;
        };

        for (id, conn) in members.iter_mut() {
            if msg.sender.as_ref() == Some(id) {
                continue;
            }
            match conn.deliver(payload.clone()) {
                Delivery::Queued => tally.delivered += 1,
                Delivery::Full => {
                    tally.dropped += 1;
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(
                        conn_id = %id,
                        room = %msg.room,
                        dropped_total = conn.drop_count(),
                        "outbound queue full, message dropped"
                    );
                }
                Delivery::Closed => tally.closed += 1,
            }
        }
        tally
    }

    /// Room holding `id`, if registered.
    pub fn room_of(&self, id: &ConnectionId) -> Option<&RoomId> {
        self.index.get(id)
    }

    /// Ids registered in `room`.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total registered connections.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Membership counts.
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            connections: self.index.len(),
            rooms: self
                .rooms
                .iter()
                .map(|(room, members)| (room.clone(), members.len()))
                .collect(),
        }
    }

    /// Apply one event to completion.
    pub fn apply(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(conn) => {
                let id = conn.id().clone();
                let room = conn.room().clone();
                if let Some(old) = self.insert(conn) {
                    warn!(
                        conn_id = %id,
                        from = %old,
                        to = %room,
                        "connection re-registered, moved"
                    );
                }
                let members = self.rooms.get(&room).map_or(0, HashMap::len);
                debug!(conn_id = %id, room = %room, members, "registered");
            }
            HubEvent::Unregister(id) => match self.remove(&id) {
                Some(conn) => debug!(
                    conn_id = %id,
                    room = %conn.room(),
                    dropped = conn.drop_count(),
                    "unregistered"
                ),
                None => debug!(conn_id = %id, "unregister for unknown connection ignored"),
            },
            HubEvent::Broadcast(msg) => {
                counter!(HUB_BROADCASTS_TOTAL).increment(1);
                let payload = match serde_json::to_string(&ChatPayload::from(&msg)) {
                    Ok(json) => Utf8Bytes::from(json),
                    Err(e) => {
                        warn!(room = %msg.room, error = %e, "failed to serialize payload");
                        return;
                    }
                };
                let tally = self.fan_out(&msg, &payload);
                debug!(
                    room = %msg.room,
                    delivered = tally.delivered,
                    dropped = tally.dropped,
                    closed = tally.closed,
                    "broadcast"
                );
            }
            HubEvent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle + control loop
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to the hub control loop.
#[derive(Clone, Debug)]
pub struct Hub {
    tx: mpsc::Sender<HubEvent>,
}

impl Hub {
    /// Spawn the control loop.
    ///
    /// The loop stops when `shutdown` is cancelled or every handle is
    /// dropped; stopping drops all connections and closes their queues.
    pub fn spawn(capacity: usize, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(rx, shutdown));
        (Self { tx }, task)
    }

    /// Add a connection to its room.
    pub async fn register(&self, conn: Connection) -> Result<(), HubClosed> {
        self.send(HubEvent::Register(conn)).await
    }

    /// Remove a connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubClosed> {
        self.send(HubEvent::Unregister(id)).await
    }

    /// Fan a message out to its room, excluding the sender.
    pub async fn broadcast(&self, msg: RoomMessage) -> Result<(), HubClosed> {
        self.send(HubEvent::Broadcast(msg)).await
    }

    /// Membership counts as of every event enqueued before this call.
    pub async fn snapshot(&self) -> Result<HubSnapshot, HubClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Snapshot(reply)).await?;
        rx.await.map_err(|_| HubClosed)
    }

    /// Members of `room`; zero if the hub has stopped.
    pub async fn room_size(&self, room: &RoomId) -> usize {
        self.snapshot()
            .await
            .map(|s| s.room_size(room))
            .unwrap_or(0)
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubClosed> {
        self.tx.send(event).await.map_err(|_| HubClosed)
    }
}

async fn run(mut rx: mpsc::Receiver<HubEvent>, shutdown: CancellationToken) {
    let mut rooms = Rooms::default();
    info!("hub started");

    loop {
        let event = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        rooms.apply(event);
    }

    info!(connections = rooms.len(), "hub stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
