// Public API
pub use broadcaster::Broadcaster;
pub use dispatcher::ChatDispatcher;
pub use handler::websocket_handler;
pub use messages::{InboundEvent, OutboundEvent};
pub use socket::{MessageHandler, PeerSession, SocketError, SocketWrapper};

// Internal modules
pub mod broadcaster;
pub mod dispatcher;
mod handler;
pub mod messages;
pub mod socket;
