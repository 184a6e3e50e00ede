use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoStaticStr;

use crate::message::models::{EncryptedPayload, MessageId};

/// Display name used until a peer announces itself with `join`
pub const ANONYMOUS: &str = "Anonymous";

/// Client -> Server events
///
/// Unknown `type` values and malformed envelopes fail to parse and are
/// dropped by the dispatcher.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Join {
        #[serde(default)]
        username: Option<String>,
    },
    UserLeaving {
        #[serde(default)]
        username: Option<String>,
    },
    Typing {
        #[serde(default)]
        username: Option<String>,
        #[serde(default, rename = "isTyping")]
        is_typing: bool,
    },
    Reaction {
        #[serde(default, rename = "messageIndex")]
        message_index: Option<Value>,
        #[serde(default)]
        emoji: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },
    Message {
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default, rename = "selfDestruct")]
        self_destruct: bool,
        #[serde(default, rename = "destructTime")]
        destruct_time: Option<Value>,
    },
}

/// Server -> Client events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutboundEvent {
    UserJoined {
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    UserLeft {
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Typing {
        username: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    Reaction {
        #[serde(rename = "messageIndex")]
        message_index: Value,
        emoji: Option<String>,
        username: String,
    },
    Message {
        data: EncryptedPayload,
        username: String,
        timestamp: DateTime<Utc>,
        #[serde(rename = "selfDestruct")]
        self_destruct: bool,
        #[serde(rename = "destructTime")]
        destruct_time: Option<u64>,
        message_id: Option<MessageId>,
    },
    MessageDeleted {
        message_id: MessageId,
        room_id: String,
        timestamp: DateTime<Utc>,
    },
    RoomExpired {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl OutboundEvent {
    pub fn user_joined(username: &str, timestamp: DateTime<Utc>) -> Self {
        Self::UserJoined {
            username: username.to_string(),
            message: format!("{} joined the room", username),
            timestamp,
        }
    }

    pub fn user_left(username: &str, timestamp: DateTime<Utc>) -> Self {
        Self::UserLeft {
            username: username.to_string(),
            message: format!("{} left the room", username),
            timestamp,
        }
    }

    pub fn message_deleted(message_id: MessageId, room_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self::MessageDeleted {
            message_id,
            room_id: room_id.to_string(),
            timestamp,
        }
    }

    pub fn room_expired(ttl_hours: i64, timestamp: DateTime<Utc>) -> Self {
        Self::RoomExpired {
            message: format!("This room has expired after {} hours", ttl_hours),
            timestamp,
        }
    }

    /// Wire name of the event, e.g. `message_deleted`
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}
