use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use harmonic_core::collaboration::{RoomMember, ServerMessage};
use harmonic_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Authenticated user ID.
    pub user_id: DbId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// Last inbound frame of any kind, Pong included.
    pub last_seen: Timestamp,
    /// Universe rooms this connection has joined.
    pub rooms: HashSet<DbId>,
}

/// Result of [`WsManager::join_room`].
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// The connection was already in the room; nothing changed.
    pub already_joined: bool,
    /// Room membership after the join, one entry per user.
    pub members: Vec<RoomMember>,
}

/// Manages all active WebSocket connections and their universe rooms.
///
/// A room is simply the set of connections whose `rooms` contains the
/// universe id. Presence events are per user: `user_joined` is sent when a
/// user's first connection enters a room and `user_left` when their last one
/// leaves it.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Sends never block; a closed channel is
/// skipped and cleaned up by its own receive loop.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String, user_id: DbId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = chrono::Utc::now();
        let conn = WsConnection {
            user_id,
            sender: tx,
            connected_at: now,
            last_seen: now,
            rooms: HashSet::new(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection, leaving every room it had joined.
    ///
    /// Returns the rooms the connection was in. Unknown IDs are a no-op.
    pub async fn remove(&self, conn_id: &str) -> Vec<DbId> {
        let mut conns = self.connections.write().await;
        let Some(conn) = conns.remove(conn_id) else {
            return Vec::new();
        };
        let rooms: Vec<DbId> = conn.rooms.into_iter().collect();
        for &universe_id in &rooms {
            notify_if_user_gone(&conns, universe_id, conn.user_id);
        }
        rooms
    }

    /// User behind a connection.
    pub async fn user_of(&self, conn_id: &str) -> Option<DbId> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .map(|conn| conn.user_id)
    }

    /// Record inbound activity on a connection.
    pub async fn touch(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.last_seen = chrono::Utc::now();
        }
    }

    /// Add a connection to a universe room.
    ///
    /// Other members receive `user_joined` unless the user was already
    /// present through another connection. Joining twice is a no-op. Returns
    /// `None` for an unknown connection.
    pub async fn join_room(&self, conn_id: &str, universe_id: DbId) -> Option<JoinOutcome> {
        let mut conns = self.connections.write().await;
        let user_id = conns.get(conn_id)?.user_id;

        let already_joined = conns
            .get(conn_id)
            .is_some_and(|conn| conn.rooms.contains(&universe_id));

        if !already_joined {
            let user_present = conns
                .values()
                .any(|c| c.user_id == user_id && c.rooms.contains(&universe_id));

            if let Some(conn) = conns.get_mut(conn_id) {
                conn.rooms.insert(universe_id);
            }

            if !user_present {
                let joined = ServerMessage::UserJoined {
                    universe_id,
                    user_id,
                };
                send_to_room(&conns, universe_id, &joined, Some(conn_id));
            }
        }

        Some(JoinOutcome {
            already_joined,
            members: members_of(&conns, universe_id),
        })
    }

    /// Remove a connection from a universe room.
    ///
    /// Returns `false` if the connection was not in the room.
    pub async fn leave_room(&self, conn_id: &str, universe_id: DbId) -> bool {
        let mut conns = self.connections.write().await;
        let Some(conn) = conns.get_mut(conn_id) else {
            return false;
        };
        if !conn.rooms.remove(&universe_id) {
            return false;
        }
        let user_id = conn.user_id;
        notify_if_user_gone(&conns, universe_id, user_id);
        true
    }

    /// Whether a connection has joined a universe room.
    pub async fn is_in_room(&self, conn_id: &str, universe_id: DbId) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.rooms.contains(&universe_id))
    }

    /// Users currently in a room, ordered by user id.
    pub async fn room_members(&self, universe_id: DbId) -> Vec<RoomMember> {
        members_of(&*self.connections.read().await, universe_id)
    }

    /// Send a message to every connection in a room, optionally skipping one.
    ///
    /// Returns the number of connections the message was queued for.
    pub async fn broadcast_to_room(
        &self,
        universe_id: DbId,
        message: &ServerMessage,
        exclude: Option<&str>,
    ) -> usize {
        send_to_room(&*self.connections.read().await, universe_id, message, exclude)
    }

    /// Send a protocol message to one connection. Returns `false` if the
    /// connection is unknown or its channel is closed.
    pub async fn send_to(&self, conn_id: &str, message: &ServerMessage) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(text(message)).is_ok())
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Drop connections silent since before `cutoff`.
    ///
    /// Each pruned connection is sent a Close frame and leaves its rooms.
    /// Returns the pruned connection IDs.
    pub async fn prune_stale(&self, cutoff: Timestamp) -> Vec<String> {
        let mut conns = self.connections.write().await;
        let stale: Vec<String> = conns
            .iter()
            .filter(|(_, conn)| conn.last_seen < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for conn_id in &stale {
            if let Some(conn) = conns.remove(conn_id) {
                let _ = conn.sender.send(Message::Close(None));
                for universe_id in conn.rooms {
                    notify_if_user_gone(&conns, universe_id, conn.user_id);
                }
                tracing::info!(conn_id = %conn_id, user_id = conn.user_id, "Pruned stale WebSocket connection");
            }
        }
        stale
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn text(message: &ServerMessage) -> Message {
    Message::Text(message.to_json().into())
}

fn send_to_room(
    conns: &HashMap<String, WsConnection>,
    universe_id: DbId,
    message: &ServerMessage,
    exclude: Option<&str>,
) -> usize {
    let frame = text(message);
    let mut count = 0;
    for (id, conn) in conns {
        if !conn.rooms.contains(&universe_id) || exclude == Some(id.as_str()) {
            continue;
        }
        if conn.sender.send(frame.clone()).is_ok() {
            count += 1;
        }
    }
    count
}

/// Broadcast `user_left` if `user_id` has no connection left in the room.
fn notify_if_user_gone(conns: &HashMap<String, WsConnection>, universe_id: DbId, user_id: DbId) {
    let still_present = conns
        .values()
        .any(|c| c.user_id == user_id && c.rooms.contains(&universe_id));
    if !still_present {
        let left = ServerMessage::UserLeft {
            universe_id,
            user_id,
        };
        send_to_room(conns, universe_id, &left, None);
    }
}

/// One entry per user, carrying their earliest connection time.
fn members_of(conns: &HashMap<String, WsConnection>, universe_id: DbId) -> Vec<RoomMember> {
    let mut earliest: HashMap<DbId, Timestamp> = HashMap::new();
    for conn in conns.values().filter(|c| c.rooms.contains(&universe_id)) {
        earliest
            .entry(conn.user_id)
            .and_modify(|t| *t = (*t).min(conn.connected_at))
            .or_insert(conn.connected_at);
    }
    let mut members: Vec<RoomMember> = earliest
        .into_iter()
        .map(|(user_id, connected_at)| RoomMember {
            user_id,
            connected_at: connected_at.to_rfc3339(),
        })
        .collect();
    members.sort_by_key(|m| m.user_id);
    members
}
