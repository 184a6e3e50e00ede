//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use super::mocks::TestClient;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub fn assert_event_type(event: &Value, expected_type: &str) {
    assert_eq!(
        event["type"], expected_type,
        "unexpected event: {}",
        event
    );
}

pub struct EventAssertion<'a> {
    clients: Vec<&'a mut TestClient>,
}

impl<'a> EventAssertion<'a> {
    pub fn for_clients(clients: Vec<&'a mut TestClient>) -> Self {
        Self { clients }
    }

    /// Assert every client received the same event of `expected_type` next
    /// (consumes it from each queue)
    pub async fn received(self, expected_type: &str) -> Value {
        let mut events = vec![];

        for client in self.clients {
            let event = client.next_event().await;
            assert_event_type(&event, expected_type);
            events.push(event);
        }

        let first = events[0].clone();
        for (i, event) in events.iter().enumerate().skip(1) {
            assert_eq!(event, &first, "client {} saw a different event than client 0", i);
        }
        first
    }

    /// Assert no client receives anything within a short quiet period
    pub async fn received_nothing(self) {
        for client in self.clients {
            client.assert_no_event().await;
        }
    }
}
