use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for rooms table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RoomModel {
    pub room_id: String, // Caller-supplied, opaque
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool, // Only the expiry sweeper clears this
}

impl RoomModel {
    /// Creates an active room that expires `ttl` after `now`
    pub fn new(room_id: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            room_id,
            created_at: now,
            expires_at: now + ttl,
            active: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Time left before expiry, zero once expired
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}
