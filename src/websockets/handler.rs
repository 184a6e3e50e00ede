use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use tracing::info;

use crate::shared::AppState;

/// WebSocket endpoint for a room
/// GET /ws/{room_id}
///
/// No authentication: room ids act as shared secrets and every payload is
/// end-to-end encrypted by the clients.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(app_state): State<AppState>,
) -> Response {
    info!(room_id = %room_id, "WebSocket connection requested");

    ws.on_upgrade(move |socket| async move {
        app_state
            .dispatcher
            .serve_connection(room_id, Box::new(socket))
            .await;
    })
}
