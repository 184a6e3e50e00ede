#![allow(dead_code)] // Test utilities may not all be used in every test

use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use vanish::{
    AppState, Config, InMemoryMessageRepository, InMemoryRoomRepository, ManualClock,
    MessageRepository, RoomSweeper,
};

use super::mocks::{MockSocket, TestClient};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app_state: AppState,
    pub clock: Arc<ManualClock>,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
}

pub struct TestSetupBuilder {
    config: Config,
    message_repository: Option<Arc<dyn MessageRepository + Send + Sync>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            message_repository: None,
        }
    }

    pub fn with_room_ttl_hours(mut self, hours: i64) -> Self {
        self.config.room_ttl_hours = hours;
        self
    }

    pub fn with_message_repository(
        mut self,
        repo: Arc<dyn MessageRepository + Send + Sync>,
    ) -> Self {
        self.message_repository = Some(repo);
        self
    }

    pub fn build(self) -> TestSetup {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let message_repository: Arc<dyn MessageRepository + Send + Sync> =
            match self.message_repository {
                Some(repo) => repo,
                None => messages.clone(),
            };

        let app_state = AppState::new(
            self.config,
            rooms.clone(),
            message_repository,
            clock.clone(),
        );

        TestSetup {
            app_state,
            clock,
            rooms,
            messages,
        }
    }
}

impl TestSetup {
    /// Opens a connection to `room_id` and waits until the registry has it
    pub async fn connect(&self, room_id: &str) -> TestClient {
        let (socket, client) = MockSocket::pair();
        let expected = self.app_state.registry.room_size(room_id).await + 1;

        let dispatcher = self.app_state.dispatcher.clone();
        let room = room_id.to_string();
        tokio::spawn(async move {
            dispatcher.serve_connection(room, Box::new(socket)).await;
        });

        self.wait_for_room_size(room_id, expected).await;
        client
    }

    /// Connects and announces `username` with a join event
    pub async fn join(&self, room_id: &str, username: &str) -> TestClient {
        let client = self.connect(room_id).await;
        client.send_json(json!({"type": "join", "username": username}));
        client
    }

    pub async fn wait_for_room_size(&self, room_id: &str, expected: usize) {
        for _ in 0..100 {
            if self.app_state.registry.room_size(room_id).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "room {} never reached {} peers (has {})",
            room_id,
            expected,
            self.app_state.registry.room_size(room_id).await
        );
    }

    pub fn sweeper(&self) -> RoomSweeper {
        self.app_state.sweeper()
    }
}
