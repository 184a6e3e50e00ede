use std::sync::Arc;
use tracing::{debug, error, warn};

use super::messages::OutboundEvent;
use crate::room::registry::{PeerHandle, PeerId, RoomRegistry};

/// Fans events out to every peer in a room
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<RoomRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Delivers `event` to every peer in `room_id` except `exclude`.
    ///
    /// Works on a snapshot of the room taken at call time. A peer that can no
    /// longer accept frames is removed from the room as if it had
    /// disconnected; other peers are unaffected. Returns the number of peers
    /// the event was delivered to.
    pub async fn broadcast(
        &self,
        event: &OutboundEvent,
        room_id: &str,
        exclude: Option<PeerId>,
    ) -> usize {
        let message_json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Failed to serialize outbound event");
                return 0;
            }
        };

        let peers = self.registry.peers(room_id).await;
        let mut delivered = 0;
        let mut gone = Vec::new();

        for peer in peers.iter().filter(|p| Some(p.id()) != exclude) {
            match peer.send(message_json.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => gone.push(peer.id()),
            }
        }

        for peer_id in gone {
            warn!(room_id = %room_id, peer_id = %peer_id, "Delivery failed, dropping peer");
            self.registry.leave(room_id, peer_id).await;
        }

        debug!(
            room_id = %room_id,
            event = event.kind(),
            delivered = delivered,
            "Broadcast complete"
        );
        delivered
    }

    /// Sends `event` and then a close frame to peers already evicted from
    /// `room_id`. Returns how many peers were still there to be closed.
    pub fn send_final(
        &self,
        event: &OutboundEvent,
        room_id: &str,
        peers: &[PeerHandle],
    ) -> usize {
        let message_json = match serde_json::to_string(event) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(room_id = %room_id, error = %e, "Failed to serialize outbound event");
                None
            }
        };

        let mut closed = 0;
        for peer in peers {
            if let Some(json) = &message_json {
                // A peer that is already gone fails the close below too
                let _ = peer.send(json.clone());
            }
            if peer.close().is_ok() {
                closed += 1;
            }
        }

        debug!(
            room_id = %room_id,
            event = event.kind(),
            closed = closed,
            "Final notice sent"
        );
        closed
    }
}
