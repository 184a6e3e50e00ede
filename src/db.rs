use sqlx::PgPool;
use tracing::info;

use crate::shared::AppError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        room_id     TEXT PRIMARY KEY,
        created_at  TIMESTAMPTZ NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL,
        active      BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE INDEX IF NOT EXISTS idx_rooms_active_expiry ON rooms (active, expires_at)",
    "CREATE TABLE IF NOT EXISTS messages (
        id                UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        room_id           TEXT NOT NULL,
        username          TEXT NOT NULL,
        payload           JSONB NOT NULL,
        created_at        TIMESTAMPTZ NOT NULL,
        self_destruct     BOOLEAN NOT NULL DEFAULT FALSE,
        destruct_seconds  BIGINT,
        destruct_at       TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_room ON messages (room_id, created_at)",
];

/// Creates the rooms and messages tables when missing
pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
    }

    info!("Database schema ready");
    Ok(())
}
