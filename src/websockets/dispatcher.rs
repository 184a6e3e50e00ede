use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    broadcaster::Broadcaster,
    messages::{InboundEvent, OutboundEvent, ANONYMOUS},
    socket::{Connection, MessageHandler, PeerSession, SocketWrapper},
};
use crate::clock::Clock;
use crate::message::{
    models::{clamp_destruct_seconds, requested_seconds, EncryptedPayload, NewMessage},
    repository::MessageRepository,
    self_destruct::SelfDestructScheduler,
};
use crate::room::registry::{PeerHandle, RoomRegistry};

/// Interprets client events and drives the registry, broadcaster and
/// self-destruct scheduler
#[derive(Clone)]
pub struct ChatDispatcher {
    broadcaster: Broadcaster,
    scheduler: SelfDestructScheduler,
    message_repository: Arc<dyn MessageRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
    default_destruct_secs: u64,
}

impl ChatDispatcher {
    pub fn new(
        broadcaster: Broadcaster,
        scheduler: SelfDestructScheduler,
        message_repository: Arc<dyn MessageRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
        default_destruct_secs: u64,
    ) -> Self {
        Self {
            broadcaster,
            scheduler,
            message_repository,
            clock,
            default_destruct_secs,
        }
    }

    fn registry(&self) -> &Arc<RoomRegistry> {
        self.broadcaster.registry()
    }

    /// Joins `socket` to `room_id` and serves it until the transport closes
    pub async fn serve_connection(&self, room_id: String, socket: Box<dyn SocketWrapper>) {
        let (peer, outbound_receiver) = PeerHandle::new();
        self.registry().join(&room_id, peer.clone()).await;

        info!(room_id = %room_id, peer_id = %peer.id(), "Peer connected");

        let connection = Connection::new(
            PeerSession::new(peer, room_id),
            socket,
            outbound_receiver,
            Arc::new(self.clone()),
        );

        let (session, result) = connection.run().await;
        match result {
            Ok(()) => {
                info!(room_id = %session.room_id, peer_id = %session.peer_id(), "Connection closed cleanly");
            }
            Err(e) => {
                warn!(room_id = %session.room_id, peer_id = %session.peer_id(), error = ?e, "Connection error");
            }
        }

        self.disconnect(&session).await;
    }

    /// Transport-level departure: drop the peer and tell the room if it had a name.
    /// Anonymous peers and peers evicted by room expiry leave silently.
    pub async fn disconnect(&self, session: &PeerSession) {
        self.registry()
            .leave(&session.room_id, session.peer_id())
            .await;
        if session.evicted {
            return;
        }

        let named = session
            .display_name
            .as_deref()
            .filter(|name| *name != ANONYMOUS);
        if let Some(name) = named {
            let event = OutboundEvent::user_left(name, self.clock.now());
            self.broadcaster
                .broadcast(&event, &session.room_id, None)
                .await;
        }
    }

    /// Applies one inbound event on behalf of `session`
    pub async fn dispatch(&self, session: &mut PeerSession, event: InboundEvent) {
        let room_id = session.room_id.clone();

        match event {
            InboundEvent::Join { username } => {
                let name = username.unwrap_or_else(|| ANONYMOUS.to_string());
                let event = OutboundEvent::user_joined(&name, self.clock.now());
                session.display_name = Some(name);
                self.broadcaster.broadcast(&event, &room_id, None).await;
            }
            InboundEvent::UserLeaving { username } => {
                let name = username.unwrap_or_else(|| current_name(session));
                let event = OutboundEvent::user_left(&name, self.clock.now());
                self.broadcaster.broadcast(&event, &room_id, None).await;
            }
            InboundEvent::Typing {
                username,
                is_typing,
            } => {
                let event = OutboundEvent::Typing {
                    username: username.unwrap_or_else(|| current_name(session)),
                    is_typing,
                };
                self.broadcaster
                    .broadcast(&event, &room_id, Some(session.peer_id()))
                    .await;
            }
            InboundEvent::Reaction {
                message_index,
                emoji,
                username,
            } => {
                let event = OutboundEvent::Reaction {
                    message_index: message_index.unwrap_or(Value::Null),
                    emoji,
                    username: username.unwrap_or_else(|| current_name(session)),
                };
                self.broadcaster.broadcast(&event, &room_id, None).await;
            }
            InboundEvent::Message {
                data,
                username,
                self_destruct,
                destruct_time,
            } => {
                let Some(payload) = data.and_then(EncryptedPayload::from_value) else {
                    debug!(room_id = %room_id, "Dropping message without ciphertext and IV");
                    return;
                };
                let username = username.unwrap_or_else(|| current_name(session));
                let destruct_seconds = self_destruct.then(|| {
                    clamp_destruct_seconds(
                        destruct_time.as_ref().and_then(requested_seconds),
                        self.default_destruct_secs,
                    )
                });

                self.relay_message(&room_id, username, payload, destruct_seconds)
                    .await;
            }
        }
    }

    /// Persists (best effort), broadcasts and, if asked, arms self-destruct
    async fn relay_message(
        &self,
        room_id: &str,
        username: String,
        payload: EncryptedPayload,
        destruct_seconds: Option<u64>,
    ) {
        let now = self.clock.now();
        let message = NewMessage::new(
            room_id.to_string(),
            username,
            payload,
            now,
            destruct_seconds,
        );

        let message_id = match self.message_repository.insert_message(&message).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Failed to persist message, relaying anyway");
                None
            }
        };

        let event = OutboundEvent::Message {
            data: message.payload,
            username: message.username,
            timestamp: now,
            self_destruct: message.self_destruct,
            destruct_time: message.destruct_seconds,
            message_id,
        };
        self.broadcaster.broadcast(&event, room_id, None).await;

        if let (Some(id), Some(secs)) = (message_id, destruct_seconds) {
            self.scheduler
                .arm(id, room_id.to_string(), Duration::from_secs(secs));
        }
    }
}

fn current_name(session: &PeerSession) -> String {
    session
        .display_name
        .clone()
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

#[async_trait]
impl MessageHandler for ChatDispatcher {
    async fn handle_message(&self, session: &mut PeerSession, message: String) {
        match serde_json::from_str::<InboundEvent>(&message) {
            Ok(event) => self.dispatch(session, event).await,
            Err(e) => {
                debug!(
                    room_id = %session.room_id,
                    peer_id = %session.peer_id(),
                    error = %e,
                    "Ignoring unparseable client event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::message::repository::InMemoryMessageRepository;
    use crate::room::registry::Outbound;
    use crate::room::repository::InMemoryRoomRepository;
    use crate::shared::test_utils::FailingMessageRepository;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        dispatcher: ChatDispatcher,
        scheduler: SelfDestructScheduler,
        registry: Arc<RoomRegistry>,
    }

    fn fixture(messages: Arc<dyn MessageRepository + Send + Sync>) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(InMemoryRoomRepository::new()),
            clock.clone(),
            chrono::Duration::hours(2),
        ));
        let broadcaster = Broadcaster::new(registry.clone());
        let scheduler = SelfDestructScheduler::new(messages.clone(), broadcaster.clone(), clock.clone());
        let dispatcher = ChatDispatcher::new(broadcaster, scheduler.clone(), messages, clock, 60);

        Fixture {
            dispatcher,
            scheduler,
            registry,
        }
    }

    async fn join(f: &Fixture, room_id: &str) -> (PeerSession, UnboundedReceiver<Outbound>) {
        let (peer, rx) = PeerHandle::new();
        f.registry.join(room_id, peer.clone()).await;
        (PeerSession::new(peer, room_id.to_string()), rx)
    }

    fn events(rx: &mut UnboundedReceiver<Outbound>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Outbound::Text(text) = frame {
                events.push(serde_json::from_str(&text).unwrap());
            }
        }
        events
    }

    async fn send(f: &Fixture, session: &mut PeerSession, value: Value) {
        f.dispatcher.handle_message(session, value.to_string()).await;
    }

    #[tokio::test]
    async fn test_join_sets_name_and_announces_to_everyone() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, mut alice_rx) = join(&f, "abc").await;
        let (_bob, mut bob_rx) = join(&f, "abc").await;

        send(&f, &mut alice, json!({"type": "join", "username": "alice"})).await;

        assert_eq!(alice.display_name.as_deref(), Some("alice"));
        for rx in [&mut alice_rx, &mut bob_rx] {
            let received = events(rx);
            assert_eq!(received.len(), 1);
            assert!(matches!(
                &received[0],
                OutboundEvent::UserJoined { username, .. } if username == "alice"
            ));
        }
    }

    #[tokio::test]
    async fn test_typing_excludes_sender_and_uses_display_name() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, mut alice_rx) = join(&f, "abc").await;
        let (_bob, mut bob_rx) = join(&f, "abc").await;
        alice.display_name = Some("alice".to_string());

        send(&f, &mut alice, json!({"type": "typing", "isTyping": true})).await;

        assert!(events(&mut alice_rx).is_empty());
        assert_eq!(
            events(&mut bob_rx),
            vec![OutboundEvent::Typing {
                username: "alice".to_string(),
                is_typing: true
            }]
        );
    }

    #[tokio::test]
    async fn test_reaction_includes_sender() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, mut alice_rx) = join(&f, "abc").await;

        send(
            &f,
            &mut alice,
            json!({"type": "reaction", "messageIndex": 3, "emoji": "🔥", "username": "al"}),
        )
        .await;

        assert_eq!(
            events(&mut alice_rx),
            vec![OutboundEvent::Reaction {
                message_index: json!(3),
                emoji: Some("🔥".to_string()),
                username: "al".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_user_leaving_announces_without_disconnecting() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, _alice_rx) = join(&f, "abc").await;
        let (_bob, mut bob_rx) = join(&f, "abc").await;

        send(&f, &mut alice, json!({"type": "user_leaving", "username": "alice"})).await;

        assert!(matches!(
            &events(&mut bob_rx)[..],
            [OutboundEvent::UserLeft { username, .. }] if username == "alice"
        ));
        assert_eq!(f.registry.room_size("abc").await, 2);
    }

    #[tokio::test]
    async fn test_message_without_iv_is_dropped() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let f = fixture(messages.clone());
        let (mut alice, mut alice_rx) = join(&f, "abc").await;

        send(&f, &mut alice, json!({"type": "message", "data": {"encrypted": "X"}})).await;
        send(&f, &mut alice, json!({"type": "message"})).await;
        send(&f, &mut alice, json!({"type": "message", "data": "X"})).await;

        assert!(events(&mut alice_rx).is_empty());
        assert_eq!(messages.message_count(), 0);
    }

    #[tokio::test]
    async fn test_garbage_and_unknown_events_are_ignored() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, mut alice_rx) = join(&f, "abc").await;

        f.dispatcher
            .handle_message(&mut alice, "{not json".to_string())
            .await;
        send(&f, &mut alice, json!({"type": "shout", "text": "hi"})).await;

        assert!(events(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn test_message_is_stored_and_echoed_with_id() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let f = fixture(messages.clone());
        let (mut alice, mut alice_rx) = join(&f, "abc").await;
        alice.display_name = Some("alice".to_string());

        send(
            &f,
            &mut alice,
            json!({"type": "message", "data": {"encrypted": "X", "iv": "Y"}}),
        )
        .await;

        match &events(&mut alice_rx)[..] {
            [OutboundEvent::Message {
                data,
                username,
                self_destruct,
                destruct_time,
                message_id: Some(id),
                ..
            }] => {
                assert_eq!(
                    serde_json::to_value(data).unwrap(),
                    json!({"encrypted": "X", "iv": "Y"})
                );
                assert_eq!(username, "alice");
                assert!(!self_destruct);
                assert!(destruct_time.is_none());
                assert!(messages.has_message(*id));
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(f.scheduler.active_timers(), 0);
    }

    #[tokio::test]
    async fn test_self_destruct_message_is_clamped_and_armed() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, mut alice_rx) = join(&f, "abc").await;

        send(
            &f,
            &mut alice,
            json!({
                "type": "message",
                "data": {"encrypted": "X", "iv": "Y"},
                "selfDestruct": true,
                "destructTime": 1000
            }),
        )
        .await;

        match &events(&mut alice_rx)[..] {
            [OutboundEvent::Message {
                destruct_time: Some(600),
                self_destruct: true,
                message_id: Some(id),
                ..
            }] => {
                assert_eq!(
                    f.scheduler.timer_state(*id),
                    crate::message::self_destruct::TimerState::Armed
                );
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_still_broadcasts_without_id() {
        let f = fixture(Arc::new(FailingMessageRepository));
        let (mut alice, mut alice_rx) = join(&f, "abc").await;

        send(
            &f,
            &mut alice,
            json!({
                "type": "message",
                "data": {"encrypted": "X", "iv": "Y"},
                "selfDestruct": true
            }),
        )
        .await;

        assert!(matches!(
            &events(&mut alice_rx)[..],
            [OutboundEvent::Message {
                message_id: None,
                destruct_time: Some(60),
                ..
            }]
        ));
        assert_eq!(f.scheduler.active_timers(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_announces_only_named_peers() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (anonymous, _anonymous_rx) = join(&f, "abc").await;
        let (mut alice, _alice_rx) = join(&f, "abc").await;
        let (_bob, mut bob_rx) = join(&f, "abc").await;
        alice.display_name = Some("alice".to_string());

        f.dispatcher.disconnect(&anonymous).await;
        assert!(events(&mut bob_rx).is_empty());

        f.dispatcher.disconnect(&alice).await;
        assert!(matches!(
            &events(&mut bob_rx)[..],
            [OutboundEvent::UserLeft { username, .. }] if username == "alice"
        ));
        assert_eq!(f.registry.room_size("abc").await, 1);
    }

    #[tokio::test]
    async fn test_peer_joined_without_username_leaves_silently() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut nameless, _nameless_rx) = join(&f, "abc").await;
        let (_bob, mut bob_rx) = join(&f, "abc").await;

        send(&f, &mut nameless, json!({"type": "join"})).await;
        assert_eq!(nameless.display_name.as_deref(), Some(ANONYMOUS));
        assert!(matches!(
            &events(&mut bob_rx)[..],
            [OutboundEvent::UserJoined { username, .. }] if username == ANONYMOUS
        ));

        f.dispatcher.disconnect(&nameless).await;

        assert!(events(&mut bob_rx).is_empty());
        assert_eq!(f.registry.room_size("abc").await, 1);
    }

    #[tokio::test]
    async fn test_evicted_peer_leaves_silently() {
        let f = fixture(Arc::new(InMemoryMessageRepository::new()));
        let (mut alice, _alice_rx) = join(&f, "abc").await;
        let (_bob, mut bob_rx) = join(&f, "abc").await;
        alice.display_name = Some("alice".to_string());
        alice.evicted = true;

        f.dispatcher.disconnect(&alice).await;

        assert!(events(&mut bob_rx).is_empty());
        assert_eq!(f.registry.room_size("abc").await, 1);
    }
}
