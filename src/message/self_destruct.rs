use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use super::{models::MessageId, repository::MessageRepository};
use crate::clock::Clock;
use crate::websockets::{broadcaster::Broadcaster, messages::OutboundEvent};

/// Lifecycle of a self-destruct timer: `Armed -> Fired -> Retired`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for its delay to elapse
    Armed,
    /// Delay elapsed, deletion in progress
    Fired,
    /// Done or never armed. Retired timers are no longer tracked.
    Retired,
}

/// What happened when a timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The record was deleted and the room was told
    Deleted,
    /// Another path (room expiry, retention, a racing timer) got there first
    AlreadyGone,
    /// The store could not be reached; nothing is retried
    Failed,
}

struct TimerEntry {
    state: TimerState,
    handle: Option<AbortHandle>,
}

struct SchedulerInner {
    timers: Mutex<HashMap<MessageId, TimerEntry>>,
    messages: Arc<dyn MessageRepository + Send + Sync>,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
}

/// Owns one timer per self-destructing message
#[derive(Clone)]
pub struct SelfDestructScheduler {
    inner: Arc<SchedulerInner>,
}

impl SelfDestructScheduler {
    pub fn new(
        messages: Arc<dyn MessageRepository + Send + Sync>,
        broadcaster: Broadcaster,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                timers: Mutex::new(HashMap::new()),
                messages,
                broadcaster,
                clock,
            }),
        }
    }

    /// Arms a timer that deletes `message_id` once `delay` has elapsed
    #[instrument(skip(self))]
    pub fn arm(&self, message_id: MessageId, room_id: String, delay: Duration) {
        let mut timers = self.inner.timers.lock().unwrap();
        if timers.contains_key(&message_id) {
            debug!(message_id = %message_id, "Timer already armed");
            return;
        }

        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(message_id, &room_id).await;
        });

        timers.insert(
            message_id,
            TimerEntry {
                state: TimerState::Armed,
                handle: Some(task.abort_handle()),
            },
        );
        debug!(message_id = %message_id, delay_secs = delay.as_secs(), "Self-destruct armed");
    }

    /// Deletes the message and announces it. Safe to call more than once:
    /// only a call that actually removes the record broadcasts.
    #[instrument(skip(self))]
    pub async fn fire(&self, message_id: MessageId, room_id: &str) -> FireOutcome {
        if let Some(entry) = self.inner.timers.lock().unwrap().get_mut(&message_id) {
            entry.state = TimerState::Fired;
        }

        let outcome = match self.inner.messages.delete_message_by_id(message_id).await {
            Ok(0) => {
                debug!(message_id = %message_id, "Message already gone, nothing to destroy");
                FireOutcome::AlreadyGone
            }
            Ok(_) => {
                let event = OutboundEvent::message_deleted(message_id, room_id, self.inner.clock.now());
                self.inner.broadcaster.broadcast(&event, room_id, None).await;
                info!(message_id = %message_id, room_id = %room_id, "Message self-destructed");
                FireOutcome::Deleted
            }
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "Self-destruct delete failed");
                FireOutcome::Failed
            }
        };

        self.inner.timers.lock().unwrap().remove(&message_id);
        outcome
    }

    /// Stops an armed timer. Returns false if it already fired or never existed.
    pub fn cancel(&self, message_id: MessageId) -> bool {
        let mut timers = self.inner.timers.lock().unwrap();
        match timers.get(&message_id) {
            Some(entry) if entry.state == TimerState::Armed => {
                if let Some(handle) = &entry.handle {
                    handle.abort();
                }
                timers.remove(&message_id);
                true
            }
            _ => false,
        }
    }

    pub fn timer_state(&self, message_id: MessageId) -> TimerState {
        self.inner
            .timers
            .lock()
            .unwrap()
            .get(&message_id)
            .map_or(TimerState::Retired, |entry| entry.state)
    }

    pub fn active_timers(&self) -> usize {
        self.inner.timers.lock().unwrap().len()
    }
}
