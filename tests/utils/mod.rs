pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{assert_event_type, EventAssertion};
#[allow(unused_imports)]
pub use mocks::{MockSocket, ServerFrame, TestClient, UnreachableMessageStore};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
