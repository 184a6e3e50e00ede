use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::models::{EncryptedPayload, MessageId, MessageModel};

/// Response for the service banner
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
    pub version: String,
    pub active_rooms: usize,
    pub room_ttl_hours: i64,
}

/// Response for the health check
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String, // "connected" or "disconnected"
    pub active_rooms: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response for room lookups; details are absent when the room does not exist
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomInfoResponse {
    pub exists: bool,
    pub room_id: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub details: Option<RoomDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomDetails {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active_users: usize,
    pub time_remaining_secs: i64,
}

/// One entry of a room's history
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub username: String,
    pub encrypted_data: EncryptedPayload,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "selfDestruct")]
    pub self_destruct: bool,
    #[serde(rename = "destructTime")]
    pub destruct_time: Option<u64>,
}

impl From<MessageModel> for HistoryMessage {
    fn from(message: MessageModel) -> Self {
        Self {
            id: message.id,
            username: message.username,
            encrypted_data: message.payload,
            timestamp: message.created_at,
            self_destruct: message.self_destruct,
            destruct_time: message.destruct_seconds,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessage>,
}
