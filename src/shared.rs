use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::Config;
use crate::message::{repository::MessageRepository, self_destruct::SelfDestructScheduler};
use crate::room::{
    cleanup_task::{RoomSweeper, SweeperConfig},
    registry::RoomRegistry,
    repository::RoomRepository,
};
use crate::websockets::{broadcaster::Broadcaster, dispatcher::ChatDispatcher};

/// Shared application state containing all dependencies
///
/// Built once at startup; every connection task and background task holds a
/// clone of the same registry, scheduler and store handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub room_repository: Arc<dyn RoomRepository + Send + Sync>,
    pub message_repository: Arc<dyn MessageRepository + Send + Sync>,
    pub registry: Arc<RoomRegistry>,
    pub broadcaster: Broadcaster,
    pub scheduler: SelfDestructScheduler,
    pub dispatcher: ChatDispatcher,
}

impl AppState {
    pub fn new(
        config: Config,
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        message_repository: Arc<dyn MessageRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new(
            Arc::clone(&room_repository),
            Arc::clone(&clock),
            config.room_ttl(),
        ));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let scheduler = SelfDestructScheduler::new(
            Arc::clone(&message_repository),
            broadcaster.clone(),
            Arc::clone(&clock),
        );
        let dispatcher = ChatDispatcher::new(
            broadcaster.clone(),
            scheduler.clone(),
            Arc::clone(&message_repository),
            Arc::clone(&clock),
            config.self_destruct_default_secs,
        );

        Self {
            config: Arc::new(config),
            clock,
            room_repository,
            message_repository,
            registry,
            broadcaster,
            scheduler,
            dispatcher,
        }
    }

    /// Builds the room expiry sweeper over this state's store and registry
    pub fn sweeper(&self) -> RoomSweeper {
        RoomSweeper::new(
            Arc::clone(&self.room_repository),
            Arc::clone(&self.message_repository),
            self.broadcaster.clone(),
            Arc::clone(&self.clock),
            SweeperConfig {
                sweep_interval: self.config.sweep_interval,
                batch_size: self.config.sweep_batch_size,
                room_ttl_hours: self.config.room_ttl_hours,
            },
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Config(_) | AppError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
