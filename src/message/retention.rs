use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use super::repository::MessageRepository;
use crate::clock::Clock;
use crate::shared::AppError;

/// Periodically drops messages older than the room lifetime.
///
/// Backstop for records no other path removed (e.g. rooms whose expiry fell
/// while the server was down). Never notifies clients.
pub async fn start_retention_task(
    message_repository: Arc<dyn MessageRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
    max_age: chrono::Duration,
    every: Duration,
) {
    info!(
        interval_secs = every.as_secs(),
        max_age_secs = max_age.num_seconds(),
        "Starting message retention task"
    );

    let mut retention_interval = interval(every);

    loop {
        retention_interval.tick().await;

        match purge_expired_messages(&message_repository, clock.as_ref(), max_age).await {
            Ok(0) => debug!("No stale messages to purge"),
            Ok(purged) => info!(purged = purged, "Purged stale messages"),
            Err(e) => error!(error = %e, "Message retention pass failed"),
        }
    }
}

#[instrument(skip(message_repository, clock))]
pub async fn purge_expired_messages(
    message_repository: &Arc<dyn MessageRepository + Send + Sync>,
    clock: &dyn Clock,
    max_age: chrono::Duration,
) -> Result<u64, AppError> {
    let cutoff = clock.now() - max_age;
    message_repository.purge_messages_older_than(cutoff).await
}
