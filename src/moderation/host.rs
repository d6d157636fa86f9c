//! Host role lifecycle: explicit transfer and succession on departure.
//!
//! `room.host_id` is the single source of truth. Every change goes
//! through `Room::set_host`, which re-synchronizes the derived
//! `is_host` flags on all participants.

use crate::room::model::{ChatMessage, Room, SystemMessageKind};
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_room, send_to_connection};
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::{ConnectionRegistry, ConnectionSender};

/// Handle an explicit transfer-host request from the current host.
pub fn handle_transfer_host(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    new_host_id: &str,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        send_event(
            tx,
            &ServerEvent::RoomError {
                message: "Room not found".to_string(),
            },
        );
        return;
    };
    if !room.is_host(connection_id) {
        send_event(
            tx,
            &ServerEvent::ControlError {
                message: "Only the host can transfer the host role".to_string(),
            },
        );
        return;
    }
    if !room.contains(new_host_id) {
        send_event(
            tx,
            &ServerEvent::ControlError {
                message: "Participant not found".to_string(),
            },
        );
        return;
    }
    if new_host_id == connection_id {
        return;
    }

    room.set_host(Some(new_host_id.to_string()));
    announce_host_change(&state.connections, &mut room, new_host_id);

    // Both affected connections learn their new role individually.
    send_event(tx, &ServerEvent::HostStatus { is_host: false });
    send_to_connection(
        &state.connections,
        new_host_id,
        &ServerEvent::HostStatus { is_host: true },
    );
}

/// Promote the first remaining participant after the host departed.
/// Insertion order makes the choice deterministic; no seniority or
/// fairness is intended. Caller guarantees the room is non-empty.
pub fn promote_successor(connections: &ConnectionRegistry, room: &mut Room) {
    let Some(successor_id) = room.first_participant_id() else {
        return;
    };
    room.set_host(Some(successor_id.clone()));

    tracing::info!(
        room_id = %room.id,
        new_host_id = %successor_id,
        "Host departed, successor promoted"
    );

    announce_host_change(connections, room, &successor_id);
    send_to_connection(
        connections,
        &successor_id,
        &ServerEvent::HostStatus { is_host: true },
    );
}

/// Shared notification sequence for transfer and succession: a
/// host-change system message in history plus a room-wide event.
fn announce_host_change(connections: &ConnectionRegistry, room: &mut Room, new_host_id: &str) {
    let new_host_username = room
        .participant(new_host_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();

    let message = ChatMessage::system(
        &format!("{new_host_username} is now the host"),
        SystemMessageKind::HostChange,
    );
    room.append_message(message.clone());
    broadcast_to_room(connections, room, &ServerEvent::NewMessage { message });
    broadcast_to_room(
        connections,
        room,
        &ServerEvent::HostChanged {
            new_host_id: new_host_id.to_string(),
            new_host_username,
        },
    );
}
