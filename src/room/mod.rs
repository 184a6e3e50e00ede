// Public API - what other modules can use
pub use cleanup_task::{RoomSweeper, SweepReport, SweeperConfig};
pub use handlers::{health, room_history, room_info, root};
pub use registry::{PeerHandle, PeerId, RoomRegistry};

// Internal modules
pub mod cleanup_task;
mod handlers;
pub mod models;
pub mod registry;
pub mod repository;
pub mod types;
