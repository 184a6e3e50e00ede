use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::models::RoomModel;
use crate::shared::AppError;

/// Trait for durable room records
#[async_trait]
pub trait RoomRepository {
    /// Creates the room, or re-activates it with fresh timestamps if it exists
    async fn upsert_room(&self, room: &RoomModel) -> Result<(), AppError>;

    async fn get_active_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError>;

    /// Active rooms whose expiry lies before `now`, soonest-expired first
    async fn find_expired_active_rooms(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RoomModel>, AppError>;

    /// Returns the number of records flipped from active to inactive
    async fn mark_room_inactive(&self, room_id: &str) -> Result<u64, AppError>;

    /// Cheap round-trip used by the health endpoint
    async fn ping(&self) -> Result<(), AppError>;
}

/// In-memory implementation of RoomRepository for development and testing
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches a room regardless of its active flag
    pub fn get_room(&self, room_id: &str) -> Option<RoomModel> {
        self.rooms.lock().unwrap().get(room_id).cloned()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn upsert_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_id = %room.room_id, expires_at = %room.expires_at, "Upserting room in memory");
        self.rooms
            .lock()
            .unwrap()
            .insert(room.room_id.clone(), room.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_active_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        Ok(rooms.get(room_id).filter(|r| r.active).cloned())
    }

    #[instrument(skip(self))]
    async fn find_expired_active_rooms(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let mut expired: Vec<RoomModel> = rooms
            .values()
            .filter(|r| r.active && r.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        expired.truncate(limit);
        Ok(expired)
    }

    #[instrument(skip(self))]
    async fn mark_room_inactive(&self, room_id: &str) -> Result<u64, AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        match rooms.get_mut(room_id) {
            Some(room) if room.active => {
                room.active = false;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// PostgreSQL implementation of room repository
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, room))]
    async fn upsert_room(&self, room: &RoomModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO rooms (room_id, created_at, expires_at, active) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (room_id) DO UPDATE SET created_at = EXCLUDED.created_at, \
             expires_at = EXCLUDED.expires_at, active = EXCLUDED.active",
        )
        .bind(&room.room_id)
        .bind(room.created_at)
        .bind(room.expires_at)
        .bind(room.active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room.room_id, "Failed to upsert room in database");
            AppError::DatabaseError(e.to_string())
        })?;

        info!(room_id = %room.room_id, expires_at = %room.expires_at, "Room upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_active_room(&self, room_id: &str) -> Result<Option<RoomModel>, AppError> {
        sqlx::query_as::<_, RoomModel>(
            "SELECT room_id, created_at, expires_at, active FROM rooms WHERE room_id = $1 AND active",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_id = %room_id, "Failed to fetch room from database");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self))]
    async fn find_expired_active_rooms(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RoomModel>, AppError> {
        sqlx::query_as::<_, RoomModel>(
            "SELECT room_id, created_at, expires_at, active FROM rooms \
             WHERE active AND expires_at < $1 ORDER BY expires_at ASC LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to query expired rooms");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self))]
    async fn mark_room_inactive(&self, room_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE rooms SET active = FALSE WHERE room_id = $1 AND active")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_id = %room_id, "Failed to mark room inactive");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
