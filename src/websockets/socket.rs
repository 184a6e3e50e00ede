use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::room::registry::{Outbound, PeerHandle, PeerId};

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message from the client
    async fn handle_message(&self, session: &mut PeerSession, message: String);
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue, // Ignore binary/ping/pong
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(None), // Connection closed
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Per-connection state: which room the peer is in and what it calls itself
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub peer: PeerHandle,
    pub room_id: String,
    /// Set by the first `join` event; client-asserted and untrusted
    pub display_name: Option<String>,
    /// The server closed this connection because its room expired
    pub evicted: bool,
}

impl PeerSession {
    pub fn new(peer: PeerHandle, room_id: String) -> Self {
        Self {
            peer,
            room_id,
            display_name: None,
            evicted: false,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer.id()
    }
}

/// Connection represents a managed WebSocket connection
/// It is used to send and receive messages to and from the client
/// The outbound receiver drains frames queued on the session's PeerHandle
pub struct Connection {
    session: PeerSession,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<Outbound>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        session: PeerSession,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<Outbound>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            session,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect.
    /// Hands the session back so the caller can clean up after it.
    pub async fn run(mut self) -> (PeerSession, Result<(), SocketError>) {
        let result = self.pump().await;
        (self.session, result)
    }

    async fn pump(&mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Handle outbound messages (from our app to client)
                frame = self.outbound_receiver.recv() => {
                    match frame {
                        Some(Outbound::Text(message)) => {
                            self.socket.send_message(message).await?
                        }
                        Some(Outbound::Close) => {
                            self.session.evicted = true;
                            break;
                        }
                        None => break,
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            self.message_handler
                                .handle_message(&mut self.session, message)
                                .await;
                        }
                        Ok(None) => return Ok(()), // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Server-initiated close
        let _ = self.socket.close().await;
        Ok(())
    }
}
