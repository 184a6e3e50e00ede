use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{models::RoomModel, repository::RoomRepository};
use crate::clock::Clock;

pub type PeerId = Uuid;

/// Frames queued for a peer's socket writer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Sending half of a live connection
///
/// Sends never wait on the socket: frames are queued and the connection task
/// drains them, so a slow peer only slows itself down.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl PeerHandle {
    /// Creates a handle together with the receiver its connection drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            receiver,
        )
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Queues a text frame. Fails once the connection has gone away.
    pub fn send(&self, text: String) -> Result<(), PeerGone> {
        self.sender.send(Outbound::Text(text)).map_err(|_| PeerGone)
    }

    /// Asks the connection to close its socket
    pub fn close(&self) -> Result<(), PeerGone> {
        self.sender.send(Outbound::Close).map_err(|_| PeerGone)
    }
}

/// The connection behind a [`PeerHandle`] is no longer reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerGone;

struct RoomEntry {
    created_at: DateTime<Utc>,
    peers: HashMap<PeerId, PeerHandle>,
}

/// Live room membership
///
/// A room is present here exactly while it has at least one connected peer.
/// Durable room records live in the [`RoomRepository`] and outlive entries
/// in this registry.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomEntry>>,
    room_repository: Arc<dyn RoomRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
    room_ttl: Duration,
}

impl RoomRegistry {
    pub fn new(
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
        room_ttl: Duration,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            room_repository,
            clock,
            room_ttl,
        }
    }

    /// Registers a peer under `room_id`.
    ///
    /// The first peer of a room creates the entry and upserts the durable
    /// record with a fresh expiry. Returns whether the entry was created.
    #[instrument(skip(self, peer), fields(peer_id = %peer.id()))]
    pub async fn join(&self, room_id: &str, peer: PeerHandle) -> bool {
        let now = self.clock.now();
        let created = {
            let mut rooms = self.rooms.write().await;
            let created = !rooms.contains_key(room_id);
            let entry = rooms.entry(room_id.to_string()).or_insert_with(|| RoomEntry {
                created_at: now,
                peers: HashMap::new(),
            });
            entry.peers.insert(peer.id(), peer);
            created
        };

        if created {
            info!(room_id = %room_id, "Room opened");
            let room = RoomModel::new(room_id.to_string(), now, self.room_ttl);
            if let Err(e) = self.room_repository.upsert_room(&room).await {
                warn!(room_id = %room_id, error = %e, "Failed to persist room record");
            }
        }

        created
    }

    /// Removes a peer; drops the room entry once it is empty.
    /// Returns whether the peer was present.
    #[instrument(skip(self))]
    pub async fn leave(&self, room_id: &str, peer_id: PeerId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get_mut(room_id) else {
            return false;
        };

        let removed = entry.peers.remove(&peer_id).is_some();
        if entry.peers.is_empty() {
            rooms.remove(room_id);
            debug!(room_id = %room_id, "Last peer left, room closed");
        }
        removed
    }

    /// Snapshot of the peers currently in a room
    pub async fn peers(&self, room_id: &str) -> Vec<PeerHandle> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|entry| entry.peers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes a room outright, handing back the peers that were in it
    #[instrument(skip(self))]
    pub async fn evict_room(&self, room_id: &str) -> Vec<PeerHandle> {
        let mut rooms = self.rooms.write().await;
        rooms
            .remove(room_id)
            .map(|entry| entry.peers.into_values().collect())
            .unwrap_or_default()
    }

    pub async fn room_size(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map_or(0, |entry| entry.peers.len())
    }

    pub async fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    pub async fn room_created_at(&self, room_id: &str) -> Option<DateTime<Utc>> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|entry| entry.created_at)
    }

    pub async fn list_rooms(&self) -> HashSet<String> {
        self.rooms.read().await.keys().cloned().collect()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
