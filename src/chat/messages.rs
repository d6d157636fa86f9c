//! Chat send paths: public, private, host-only, and system messages,
//! plus the typing-indicator relay and host-gated settings updates.
//!
//! Every send validates against the policy engine first; a refusal is
//! surfaced to the sender only as a `chat-error` event and mutates
//! nothing. Successful sends append to the room's bounded log before
//! routing.

use crate::room::model::{ChatMessage, ChatSettingsPatch, MessageKind, SystemMessageKind};
use crate::room::policy;
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_room, broadcast_to_room_except, send_to_connection};
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::ConnectionSender;

fn room_not_found(tx: &ConnectionSender) {
    send_event(
        tx,
        &ServerEvent::RoomError {
            message: "Room not found".to_string(),
        },
    );
}

fn chat_error(tx: &ConnectionSender, reason: &policy::SendDenied) {
    send_event(
        tx,
        &ServerEvent::ChatError {
            message: reason.to_string(),
        },
    );
}

/// Public message: permission per room settings, then broadcast to
/// every connection in the room.
pub fn handle_public_message(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    username: &str,
    body: &str,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    if let Err(denied) = policy::check_public_send(&room, connection_id) {
        chat_error(tx, &denied);
        return;
    }

    let message = ChatMessage::user(username, body, MessageKind::Public);
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
}

/// Private message: delivered to the sender and the resolved recipient.
/// With `to_host` the recipient is the current host. The host is not
/// copied on other private traffic at send time; host audit happens
/// through history visibility.
#[allow(clippy::too_many_arguments)]
pub fn handle_private_message(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    username: &str,
    body: &str,
    recipient_username: Option<&str>,
    to_host: bool,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    let recipient_id =
        match policy::check_private_send(&room, connection_id, recipient_username, to_host) {
            Ok(id) => id,
            Err(denied) => {
                chat_error(tx, &denied);
                return;
            }
        };

    let message = ChatMessage::user(
        username,
        body,
        MessageKind::Private {
            sender_id: connection_id.to_string(),
            recipient_id: recipient_id.clone(),
            to_host,
        },
    );
    room.append_message(message.clone());

    let event = ServerEvent::NewMessage { message };
    send_event(tx, &event);
    if recipient_id != connection_id {
        send_to_connection(&state.connections, &recipient_id, &event);
    }
}

/// Host-only announcement. Echoed back to the sender only; everyone
/// else sees it through history replay, where visibility keeps it
/// host-scoped.
pub fn handle_host_message(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    username: &str,
    body: &str,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    if let Err(denied) = policy::check_host_send(&room, connection_id) {
        chat_error(tx, &denied);
        return;
    }

    let message = ChatMessage::user(username, body, MessageKind::HostOnly);
    room.append_message(message.clone());
    send_event(tx, &ServerEvent::NewMessage { message });
}

/// System message: appended to history and broadcast to the whole room.
pub fn handle_system_message(
    state: &AppState,
    tx: &ConnectionSender,
    room_id: &str,
    body: &str,
    system_type: SystemMessageKind,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    let message = ChatMessage::system(body, system_type);
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
}

/// Typing indicator: pure relay to the other participants. No state,
/// no history.
pub fn handle_typing_indicator(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
    username: &str,
    is_typing: bool,
) {
    let Some(room) = state.rooms.get(room_id) else {
        return;
    };
    broadcast_to_room_except(
        &state.connections,
        &room,
        connection_id,
        &ServerEvent::Typing {
            username: username.to_string(),
            is_typing,
        },
    );
}

/// Host-gated update of room chat permissions. Broadcasts the new
/// settings and announces the change in history.
pub fn handle_update_chat_settings(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    patch: ChatSettingsPatch,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    if !room.is_host(connection_id) {
        chat_error(tx, &policy::SendDenied::Forbidden);
        return;
    }

    room.chat_settings.apply(patch);
    broadcast_to_room(
        &state.connections,
        &room,
        &ServerEvent::ChatSettingsUpdated {
            settings: room.chat_settings,
        },
    );

    let host_name = room
        .participant(connection_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();
    let message = ChatMessage::system(
        &format!("{host_name} updated the chat settings"),
        SystemMessageKind::HostAction,
    );
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
}
