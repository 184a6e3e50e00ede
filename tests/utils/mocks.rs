#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use vanish::{
    message::{MessageId, MessageModel, NewMessage},
    AppError, MessageRepository, SocketError, SocketWrapper,
};

/// Long enough to cover the shortest self-destruct delay under paused time
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);
const QUIET_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// What the server pushed down a mock socket
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Text(String),
    Closed,
}

/// Server side of an in-process connection
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

impl MockSocket {
    /// Returns the socket to hand to the dispatcher and the client driving it
    pub fn pair() -> (MockSocket, TestClient) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();

        (
            MockSocket { inbound, outbound },
            TestClient {
                to_server: Some(to_server),
                from_server,
            },
        )
    }
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.outbound
            .send(ServerFrame::Text(message))
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.outbound
            .send(ServerFrame::Closed)
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Client side of an in-process connection
pub struct TestClient {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<ServerFrame>,
}

impl TestClient {
    pub fn send_json(&self, event: Value) {
        self.send_raw(&event.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        self.to_server
            .as_ref()
            .expect("client already disconnected")
            .send(text.to_string())
            .expect("server side of the socket is gone");
    }

    /// Drops the client half; the server sees a clean close
    pub fn disconnect(&mut self) {
        self.to_server.take();
    }

    pub async fn next_frame(&mut self) -> Option<ServerFrame> {
        timeout(RECEIVE_TIMEOUT, self.from_server.recv())
            .await
            .expect("timed out waiting for a server frame")
    }

    /// Next text frame parsed as JSON
    pub async fn next_event(&mut self) -> Value {
        match self.next_frame().await {
            Some(ServerFrame::Text(text)) => {
                serde_json::from_str(&text).expect("server sent invalid JSON")
            }
            other => panic!("expected an event, got {:?}", other),
        }
    }

    pub async fn expect_closed(&mut self) {
        let frame = self.next_frame().await;
        assert_eq!(frame, Some(ServerFrame::Closed), "expected a close frame");
    }

    pub async fn assert_no_event(&mut self) {
        if let Ok(frame) = timeout(QUIET_PERIOD, self.from_server.recv()).await {
            panic!("expected silence, got {:?}", frame);
        }
    }
}

/// Message store that is always unreachable
pub struct UnreachableMessageStore;

fn unreachable() -> AppError {
    AppError::DatabaseError("connection refused".to_string())
}

#[async_trait]
impl MessageRepository for UnreachableMessageStore {
    async fn insert_message(&self, _message: &NewMessage) -> Result<MessageId, AppError> {
        Err(unreachable())
    }

    async fn delete_message_by_id(&self, _message_id: MessageId) -> Result<u64, AppError> {
        Err(unreachable())
    }

    async fn delete_messages_for_room(&self, _room_id: &str) -> Result<u64, AppError> {
        Err(unreachable())
    }

    async fn recent_messages(
        &self,
        _room_id: &str,
        _limit: usize,
    ) -> Result<Vec<MessageModel>, AppError> {
        Err(unreachable())
    }

    async fn purge_messages_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        Err(unreachable())
    }
}
