use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::lifecycle;
use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::ConnectionSender;

/// Ping interval: server sends a WebSocket ping every 30 seconds to
/// detect abrupt disconnects that never deliver a Close frame.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds after a ping,
/// the connection is closed.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for a WebSocket.
///
/// Splits the socket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: decodes incoming events, dispatches to handlers
///
/// The mpsc channel lets any part of the system push events to this
/// client by cloning the sender. On exit the connection is treated as
/// disconnected regardless of how the stream ended.
pub async fn run_connection(socket: WebSocket, state: AppState, connection_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    register_connection(&state, &connection_id, tx.clone());

    tracing::info!(connection_id = %connection_id, "WebSocket actor started");

    // Writer task: forwards mpsc messages to the WebSocket sink.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception.
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Ping task: periodic pings with pong monitoring.
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick.
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone.
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue.
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(&text, &tx, &state, &connection_id);
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Received binary message (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = %connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks.
    writer_handle.abort();
    ping_handle.abort();

    unregister_connection(&state, &connection_id);

    // Unexpected loss of the connection is identical to an explicit
    // disconnect: leave the room, announce, maybe promote a new host.
    lifecycle::handle_disconnect(&state, &connection_id);

    tracing::info!(connection_id = %connection_id, "WebSocket actor stopped");
}

/// Writer task: receives from the mpsc channel and forwards to the sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken.
            break;
        }
    }
}

fn register_connection(state: &AppState, connection_id: &str, tx: ConnectionSender) {
    state.connections.insert(connection_id.to_string(), tx);
    tracing::debug!(
        connection_id = %connection_id,
        connections = state.connections.len(),
        "Connection registered"
    );
}

fn unregister_connection(state: &AppState, connection_id: &str) {
    state.connections.remove(connection_id);
    tracing::debug!(connection_id = %connection_id, "Connection unregistered");
}
