use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{EncryptedPayload, MessageId, MessageModel, NewMessage};
use crate::shared::AppError;

/// Trait for message repository operations
///
/// Every delete reports how many records it actually removed so callers can
/// tell a real deletion apart from one that lost a race with another path.
#[async_trait]
pub trait MessageRepository {
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, AppError>;
    async fn delete_message_by_id(&self, message_id: MessageId) -> Result<u64, AppError>;
    async fn delete_messages_for_room(&self, room_id: &str) -> Result<u64, AppError>;

    /// Oldest-first history for a room, at most `limit` records
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageModel>, AppError>;

    /// Removes every message created before `cutoff`
    async fn purge_messages_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

/// In-memory implementation of MessageRepository for development and testing
pub struct InMemoryMessageRepository {
    messages: Mutex<HashMap<MessageId, MessageModel>>,
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn has_message(&self, message_id: MessageId) -> bool {
        self.messages.lock().unwrap().contains_key(&message_id)
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    #[instrument(skip(self, message))]
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, AppError> {
        let id = Uuid::new_v4();
        self.messages
            .lock()
            .unwrap()
            .insert(id, MessageModel::from_new(id, message));

        debug!(message_id = %id, room_id = %message.room_id, "Message stored in memory");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn delete_message_by_id(&self, message_id: MessageId) -> Result<u64, AppError> {
        let removed = self.messages.lock().unwrap().remove(&message_id);
        Ok(removed.map_or(0, |_| 1))
    }

    #[instrument(skip(self))]
    async fn delete_messages_for_room(&self, room_id: &str) -> Result<u64, AppError> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|_, m| m.room_id != room_id);
        Ok((before - messages.len()) as u64)
    }

    #[instrument(skip(self))]
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageModel>, AppError> {
        let messages = self.messages.lock().unwrap();
        let mut history: Vec<MessageModel> = messages
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        history.sort_by_key(|m| m.created_at);
        history.truncate(limit);
        Ok(history)
    }

    #[instrument(skip(self))]
    async fn purge_messages_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|_, m| m.created_at >= cutoff);
        Ok((before - messages.len()) as u64)
    }
}

/// PostgreSQL implementation of message repository
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(e: sqlx::Error, context: &str) -> AppError {
    warn!(error = %e, "{}", context);
    AppError::DatabaseError(e.to_string())
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    #[instrument(skip(self, message))]
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageId, AppError> {
        let row = sqlx::query(
            "INSERT INTO messages (room_id, username, payload, created_at, self_destruct, destruct_seconds, destruct_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&message.room_id)
        .bind(&message.username)
        .bind(Json(&message.payload))
        .bind(message.created_at)
        .bind(message.self_destruct)
        .bind(message.destruct_seconds.map(|s| s as i64))
        .bind(message.destruct_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error(e, "Failed to insert message"))?;

        let id: Uuid = row.get("id");
        debug!(message_id = %id, room_id = %message.room_id, "Message stored in database");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn delete_message_by_id(&self, message_id: MessageId) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error(e, "Failed to delete message"))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete_messages_for_room(&self, room_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error(e, "Failed to delete room messages"))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn recent_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageModel>, AppError> {
        let rows = sqlx::query(
            "SELECT id, room_id, username, payload, created_at, self_destruct, destruct_seconds, destruct_at \
             FROM messages WHERE room_id = $1 ORDER BY created_at ASC LIMIT $2",
        )
        .bind(room_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error(e, "Failed to fetch message history"))?;

        let messages = rows
            .into_iter()
            .map(|row| {
                let payload: Json<EncryptedPayload> = row.get("payload");
                let destruct_seconds: Option<i64> = row.get("destruct_seconds");
                MessageModel {
                    id: row.get("id"),
                    room_id: row.get("room_id"),
                    username: row.get("username"),
                    payload: payload.0,
                    created_at: row.get("created_at"),
                    self_destruct: row.get("self_destruct"),
                    destruct_seconds: destruct_seconds.map(|s| s.max(0) as u64),
                    destruct_at: row.get("destruct_at"),
                }
            })
            .collect();

        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn purge_messages_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error(e, "Failed to purge old messages"))?;

        Ok(result.rows_affected())
    }
}
