//! Connection lifecycle: the join sequence and disconnect cleanup.
//!
//! Join ordering matters: the joiner must receive its own context
//! (host status, room metadata, history replay, settings, peers)
//! before anyone else is told of its arrival, so a peer cannot signal
//! the joiner before it has local state. The whole sequence runs under
//! the room's exclusive entry guard.

use crate::moderation;
use crate::room::model::{ChatMessage, Participant, SystemMessageKind};
use crate::room::policy;
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_room, broadcast_to_room_except};
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::ConnectionSender;

/// How many log entries are replayed to a joining participant.
const HISTORY_REPLAY_LIMIT: usize = 50;

/// Handle a join request. Unknown room ⇒ requester-only `room-error`,
/// no state change.
pub fn handle_join(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    username: &str,
    peer_id: &str,
) {
    // A connection lives in at most one room; joining another room
    // implies leaving the previous one first.
    if let Some(previous) = state.rooms.room_of_connection(connection_id) {
        if previous != room_id {
            handle_disconnect(state, connection_id);
        }
    }

    let Some(mut room) = state.rooms.get_mut(room_id) else {
        tracing::warn!(connection_id = %connection_id, room_id = %room_id, "Join to unknown room");
        send_event(
            tx,
            &ServerEvent::RoomError {
                message: "Room not found".to_string(),
            },
        );
        return;
    };

    // A join within the grace window rescues an emptied room.
    state.rooms.cancel_destruction(room_id);

    room.add_participant(Participant::new(connection_id, username, peer_id));
    let is_host = room.is_host(connection_id);

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        username = %username,
        is_host,
        "Participant joined"
    );

    // 1. Host-assignment notice.
    send_event(tx, &ServerEvent::HostStatus { is_host });

    // 2. Room metadata.
    send_event(
        tx,
        &ServerEvent::RoomInfo {
            room_id: room.id.clone(),
            created_at: room.created_at,
            host_id: room.host_id.clone(),
        },
    );

    // 3. Replay of recent history, filtered for this viewer.
    let history: Vec<ChatMessage> = room
        .recent_messages(HISTORY_REPLAY_LIMIT)
        .filter(|m| policy::visible(m, connection_id, &room))
        .cloned()
        .collect();
    send_event(tx, &ServerEvent::MessageHistory { messages: history });

    // 4. Current settings.
    send_event(
        tx,
        &ServerEvent::ChatSettingsUpdated {
            settings: room.chat_settings,
        },
    );
    send_event(
        tx,
        &ServerEvent::HostMasterControlsUpdated {
            controls: room.host_master_controls,
        },
    );

    // 5. Current participant set, excluding self.
    let others: Vec<Participant> = room
        .participants()
        .filter(|p| p.id != connection_id)
        .cloned()
        .collect();
    send_event(tx, &ServerEvent::ParticipantList { participants: others });

    // Only now tell the rest of the room.
    let joined = room
        .participant(connection_id)
        .cloned()
        .unwrap_or_else(|| Participant::new(connection_id, username, peer_id));
    broadcast_to_room_except(
        &state.connections,
        &room,
        connection_id,
        &ServerEvent::UserJoined { participant: joined },
    );

    let message = ChatMessage::system(
        &format!("{username} joined the meeting"),
        SystemMessageKind::Join,
    );
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
}

/// Handle a disconnect (explicit close or transport loss). Idempotent:
/// a connection id not present in any room is a no-op.
pub fn handle_disconnect(state: &AppState, connection_id: &str) {
    let Some(room_id) = state.rooms.room_of_connection(connection_id) else {
        return;
    };
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        return;
    };
    let Some(departed) = room.remove_participant(connection_id) else {
        return;
    };

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        username = %departed.username,
        "Participant left"
    );

    let message = ChatMessage::system(
        &format!("{} left the meeting", departed.username),
        SystemMessageKind::Leave,
    );
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
    broadcast_to_room(
        &state.connections,
        &room,
        &ServerEvent::UserLeft {
            id: departed.id.clone(),
            username: departed.username.clone(),
            peer_id: departed.peer_id.clone(),
        },
    );

    // Resolve host status against room.host_id, not the cached flag.
    if room.host_id.as_deref() == Some(connection_id) {
        if room.is_empty() {
            room.set_host(None);
        } else {
            moderation::host::promote_successor(&state.connections, &mut room);
        }
    }

    let now_empty = room.is_empty();
    drop(room);
    if now_empty {
        state.rooms.clone().schedule_destruction(&room_id);
    }
}
