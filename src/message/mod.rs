// Public API
pub use models::{EncryptedPayload, MessageId, MessageModel, NewMessage};
pub use repository::{InMemoryMessageRepository, MessageRepository, PostgresMessageRepository};
pub use retention::start_retention_task;
pub use self_destruct::{FireOutcome, SelfDestructScheduler, TimerState};

// Internal modules
pub mod models;
pub mod repository;
pub mod retention;
pub mod self_destruct;
