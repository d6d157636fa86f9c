//! Event fan-out to one, several, or all connections in a room.
//!
//! Delivery is fire-and-forget: events are pushed into per-connection
//! unbounded channels and a send to a departed connection is dropped
//! silently. The event is serialized once and the frame cloned per
//! recipient.

use axum::extract::ws::{CloseFrame, Message};

use crate::room::model::Room;
use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionRegistry;

/// Send an event to a single connection by id.
pub fn send_to_connection(registry: &ConnectionRegistry, connection_id: &str, event: &ServerEvent) {
    let Ok(text) = serde_json::to_string(event) else {
        return;
    };
    if let Some(sender) = registry.get(connection_id) {
        let _ = sender.send(Message::Text(text.into()));
    }
}

/// Broadcast an event to every participant of a room.
pub fn broadcast_to_room(registry: &ConnectionRegistry, room: &Room, event: &ServerEvent) {
    let Ok(text) = serde_json::to_string(event) else {
        return;
    };
    let msg = Message::Text(text.into());
    for participant in room.participants() {
        if let Some(sender) = registry.get(&participant.id) {
            let _ = sender.send(msg.clone());
        }
    }
}

/// Broadcast an event to every participant except one connection id.
pub fn broadcast_to_room_except(
    registry: &ConnectionRegistry,
    room: &Room,
    except_id: &str,
    event: &ServerEvent,
) {
    let Ok(text) = serde_json::to_string(event) else {
        return;
    };
    let msg = Message::Text(text.into());
    for participant in room.participants() {
        if participant.id == except_id {
            continue;
        }
        if let Some(sender) = registry.get(&participant.id) {
            let _ = sender.send(msg.clone());
        }
    }
}

/// Force-close one connection (participant removal). Sends a WebSocket
/// Close frame; the connection's own actor performs the cleanup when
/// the close propagates back as a disconnect.
pub fn force_close_connection(
    registry: &ConnectionRegistry,
    connection_id: &str,
    close_code: u16,
    reason: &str,
) {
    if let Some(sender) = registry.get(connection_id) {
        let close_frame = CloseFrame {
            code: close_code,
            reason: reason.into(),
        };
        let _ = sender.send(Message::Close(Some(close_frame)));
    }
}
