use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument, warn};

use super::types::{
    HealthResponse, HistoryMessage, HistoryResponse, RoomDetails, RoomInfoResponse, RootResponse,
};
use crate::shared::{AppError, AppState};

const HISTORY_LIMIT: usize = 100;

/// GET /
#[instrument(name = "root", skip(state))]
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Vanish ephemeral chat relay".to_string(),
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_rooms: state.registry.room_count().await,
        room_ttl_hours: state.config.room_ttl_hours,
    })
}

/// GET /health
///
/// Always answers 200; a failing store shows up as `database: "disconnected"`.
#[instrument(name = "health", skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.room_repository.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "Store ping failed");
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
        active_rooms: state.registry.room_count().await,
        timestamp: state.clock.now(),
    })
}

/// GET /room/{room_id}/info
///
/// A room found past its expiry is retired on the spot and reported missing.
#[instrument(name = "room_info", skip(state))]
pub async fn room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfoResponse>, AppError> {
    let now = state.clock.now();

    let Some(room) = state.room_repository.get_active_room(&room_id).await? else {
        return Ok(Json(RoomInfoResponse {
            exists: false,
            room_id,
            details: None,
        }));
    };

    if room.is_expired(now) {
        info!(room_id = %room_id, expires_at = %room.expires_at, "Room looked up after expiry");
        state.room_repository.mark_room_inactive(&room_id).await?;
        return Ok(Json(RoomInfoResponse {
            exists: false,
            room_id,
            details: None,
        }));
    }

    let details = RoomDetails {
        created_at: room.created_at,
        expires_at: room.expires_at,
        active_users: state.registry.room_size(&room_id).await,
        time_remaining_secs: room.time_remaining(now).num_seconds(),
    };

    Ok(Json(RoomInfoResponse {
        exists: true,
        room_id,
        details: Some(details),
    }))
}

/// GET /room/{room_id}/history
///
/// Oldest first, capped at 100 records of an active room.
#[instrument(name = "room_history", skip(state))]
pub async fn room_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    if state
        .room_repository
        .get_active_room(&room_id)
        .await?
        .is_none()
    {
        return Ok(Json(HistoryResponse { messages: vec![] }));
    }

    let messages: Vec<HistoryMessage> = state
        .message_repository
        .recent_messages(&room_id, HISTORY_LIMIT)
        .await?
        .into_iter()
        .filter(|m| !m.payload.is_empty())
        .map(HistoryMessage::from)
        .collect();

    info!(room_id = %room_id, count = messages.len(), "History served");

    Ok(Json(HistoryResponse { messages }))
}
