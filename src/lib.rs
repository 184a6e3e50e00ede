// Library crate for the vanish chat relay
// This file exposes the public API for integration tests

pub mod clock;
pub mod config;
pub mod db;
pub mod message;
pub mod room;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use message::{
    repository::{InMemoryMessageRepository, MessageRepository},
    SelfDestructScheduler,
};
pub use room::{
    models::RoomModel,
    repository::{InMemoryRoomRepository, RoomRepository},
    RoomRegistry, RoomSweeper,
};
pub use shared::{AppError, AppState};
pub use websockets::{
    Broadcaster, ChatDispatcher, InboundEvent, MessageHandler, OutboundEvent, PeerSession,
    SocketError, SocketWrapper,
};
