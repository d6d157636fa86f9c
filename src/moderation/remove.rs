//! Host force-removal of a participant.

use crate::room::model::{ChatMessage, SystemMessageKind};
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_room, force_close_connection, send_to_connection};
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::ConnectionSender;

/// Close code sent to a removed participant.
const CLOSE_REMOVED: u16 = 4004;

/// Handle a remove-participant request.
///
/// Requires host privilege. Removing a connection id that is not in
/// the room is a silent no-op with no broadcast. The target is told it
/// was removed, the rest of the room is notified, and the target's
/// socket is force-closed; the close propagating back through the
/// target's actor becomes an idempotent disconnect.
pub fn handle_remove_participant(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    target_id: &str,
    _peer_id: &str,
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
                message: "Only the host can remove participants".to_string(),
            },
        );
        return;
    }
    if target_id == connection_id {
        return;
    }
    let Some(target) = room.participant(target_id).cloned() else {
        return;
    };

    tracing::info!(
        room_id = %room_id,
        target_id = %target_id,
        username = %target.username,
        "Participant removed by host"
    );

    // Announce while the target is still a member so it sees the
    // system message too.
    let message = ChatMessage::system(
        &format!("{} was removed from the meeting", target.username),
        SystemMessageKind::Remove,
    );
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });

    send_to_connection(&state.connections, target_id, &ServerEvent::RemovedFromRoom);

    room.remove_participant(target_id);
    broadcast_to_room(
        &state.connections,
        &room,
        &ServerEvent::ParticipantRemoved {
            id: target.id.clone(),
            peer_id: target.peer_id.clone(),
            username: target.username.clone(),
        },
    );
    drop(room);

    force_close_connection(
        &state.connections,
        target_id,
        CLOSE_REMOVED,
        "Removed by host",
    );
}
