use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

use super::{models::RoomModel, registry::RoomRegistry, repository::RoomRepository};
use crate::clock::Clock;
use crate::message::repository::MessageRepository;
use crate::shared::AppError;
use crate::websockets::{broadcaster::Broadcaster, messages::OutboundEvent};

/// Configuration for the room expiry sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to look for expired rooms
    pub sweep_interval: Duration,
    /// Upper bound on rooms handled per sweep
    pub batch_size: usize,
    /// Room lifetime, quoted in the expiry notice
    pub room_ttl_hours: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5 * 60), // 5 minutes
            batch_size: 200,
            room_ttl_hours: 2,
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub rooms_expired: usize,
    pub messages_deleted: u64,
    pub peers_disconnected: usize,
}

/// Enforces room lifetime across the store and live connections.
///
/// This is the authoritative deletion path for expired rooms: unlike the
/// message retention backstop it tells connected peers what happened.
pub struct RoomSweeper {
    room_repository: Arc<dyn RoomRepository + Send + Sync>,
    message_repository: Arc<dyn MessageRepository + Send + Sync>,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl RoomSweeper {
    pub fn new(
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        message_repository: Arc<dyn MessageRepository + Send + Sync>,
        broadcaster: Broadcaster,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            room_repository,
            message_repository,
            broadcaster,
            clock,
            config,
        }
    }

    fn registry(&self) -> &Arc<RoomRegistry> {
        self.broadcaster.registry()
    }

    /// Runs forever. A failed sweep is logged and retried on the next tick.
    pub async fn run(self) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Starting room expiry sweeper"
        );

        let mut sweep_interval = interval(self.config.sweep_interval);

        loop {
            sweep_interval.tick().await;

            match self.sweep_expired_rooms().await {
                Ok(report) if report.rooms_expired > 0 => {
                    info!(
                        rooms_expired = report.rooms_expired,
                        messages_deleted = report.messages_deleted,
                        peers_disconnected = report.peers_disconnected,
                        "Room sweep completed"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Room sweep failed");
                }
            }
        }
    }

    /// Expires every active room past its deadline, up to the batch size
    #[instrument(skip(self))]
    pub async fn sweep_expired_rooms(&self) -> Result<SweepReport, AppError> {
        let expired = self
            .room_repository
            .find_expired_active_rooms(self.clock.now(), self.config.batch_size)
            .await?;

        let mut report = SweepReport::default();

        for room in expired {
            match self.expire_room(&room).await {
                Ok((messages_deleted, peers_disconnected)) => {
                    report.rooms_expired += 1;
                    report.messages_deleted += messages_deleted;
                    report.peers_disconnected += peers_disconnected;
                }
                Err(e) => {
                    warn!(room_id = %room.room_id, error = %e, "Failed to expire room");
                }
            }
        }

        Ok(report)
    }

    /// Deactivates a room, purges its messages and evicts anyone still in it.
    /// Returns (messages deleted, peers disconnected).
    async fn expire_room(&self, room: &RoomModel) -> Result<(u64, usize), AppError> {
        let room_id = room.room_id.as_str();
        info!(room_id = %room_id, expired_at = %room.expires_at, "Expiring room");

        self.room_repository.mark_room_inactive(room_id).await?;

        let messages_deleted = match self.message_repository.delete_messages_for_room(room_id).await {
            Ok(count) => count,
            Err(e) => {
                // Left for the retention backstop
                warn!(room_id = %room_id, error = %e, "Failed to purge room messages");
                0
            }
        };

        // Evict before notifying so a peer joining mid-sweep lands in a fresh room
        let evicted = self.registry().evict_room(room_id).await;
        let peers_disconnected = if evicted.is_empty() {
            0
        } else {
            let notice = OutboundEvent::room_expired(self.config.room_ttl_hours, self.clock.now());
            self.broadcaster.send_final(&notice, room_id, &evicted)
        };

        Ok((messages_deleted, peers_disconnected))
    }
}
