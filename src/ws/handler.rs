use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
///
/// WebSocket upgrade endpoint. Each connection is assigned a fresh
/// connection id, which identifies the participant for its lifetime.
/// Participants carry no verified identity; the username supplied at
/// join time is a display string only.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let connection_id = Uuid::new_v4().to_string();
    tracing::info!(connection_id = %connection_id, "WebSocket connection accepted");
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, connection_id: String) {
    actor::run_connection(socket, state, connection_id).await;
}
