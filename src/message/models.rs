use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier assigned to a message by the store on insert
pub type MessageId = Uuid;

/// Shortest self-destruct delay a client may request
pub const MIN_SELF_DESTRUCT_SECS: u64 = 5;
/// Longest self-destruct delay a client may request
pub const MAX_SELF_DESTRUCT_SECS: u64 = 600;

/// Client-encrypted message body. The server never looks past the presence
/// of the `encrypted` and `iv` fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EncryptedPayload(Map<String, Value>);

impl EncryptedPayload {
    /// Accepts a JSON object carrying both ciphertext and IV fields
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) if fields.contains_key("encrypted") && fields.contains_key("iv") => {
                Some(Self(fields))
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A message about to be written to the store
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: String,
    pub username: String,
    pub payload: EncryptedPayload,
    pub created_at: DateTime<Utc>,
    pub self_destruct: bool,
    pub destruct_seconds: Option<u64>,
    pub destruct_at: Option<DateTime<Utc>>,
}

impl NewMessage {
    /// Builds a message, computing the self-destruct window when requested
    pub fn new(
        room_id: String,
        username: String,
        payload: EncryptedPayload,
        created_at: DateTime<Utc>,
        destruct_seconds: Option<u64>,
    ) -> Self {
        let destruct_at =
            destruct_seconds.map(|secs| created_at + chrono::Duration::seconds(secs as i64));

        Self {
            room_id,
            username,
            payload,
            created_at,
            self_destruct: destruct_seconds.is_some(),
            destruct_seconds,
            destruct_at,
        }
    }
}

/// Database model for messages table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageModel {
    pub id: MessageId,
    pub room_id: String,
    pub username: String,
    pub payload: EncryptedPayload,
    pub created_at: DateTime<Utc>,
    pub self_destruct: bool,
    pub destruct_seconds: Option<u64>,
    pub destruct_at: Option<DateTime<Utc>>,
}

impl MessageModel {
    pub fn from_new(id: MessageId, message: &NewMessage) -> Self {
        Self {
            id,
            room_id: message.room_id.clone(),
            username: message.username.clone(),
            payload: message.payload.clone(),
            created_at: message.created_at,
            self_destruct: message.self_destruct,
            destruct_seconds: message.destruct_seconds,
            destruct_at: message.destruct_at,
        }
    }
}

/// Resolves the requested self-destruct delay into the allowed window.
///
/// A missing or zero request falls back to `default_secs`; the result is
/// always within [`MIN_SELF_DESTRUCT_SECS`, `MAX_SELF_DESTRUCT_SECS`].
pub fn clamp_destruct_seconds(requested: Option<i64>, default_secs: u64) -> u64 {
    let seconds = match requested {
        Some(secs) if secs != 0 => secs,
        _ => default_secs.min(i64::MAX as u64) as i64,
    };

    seconds.clamp(MIN_SELF_DESTRUCT_SECS as i64, MAX_SELF_DESTRUCT_SECS as i64) as u64
}

/// Reads a client-supplied delay that may arrive as a number or a numeric string
pub fn requested_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
