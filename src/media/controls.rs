//! Audio/video/screen-share state propagation.
//!
//! Self toggles always update the actor's own flag and notify the
//! rest of the room. When the actor is host and the matching master
//! control is enabled, the toggle additionally cascades: every other
//! participant is force-set to the same value and individually told
//! who did it.
//!
//! Per-target host controls are asymmetric on purpose: muting or
//! disabling forces the target's state, while unmuting or enabling
//! only asks the target to act locally — the server never switches a
//! microphone or camera on for someone.

use crate::room::model::{ChatMessage, HostMasterControlsPatch, Room, SystemMessageKind};
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_room, broadcast_to_room_except, send_to_connection};
use crate::ws::protocol::{send_event, MediaKind, ServerEvent};
use crate::ws::ConnectionSender;

fn room_not_found(tx: &ConnectionSender) {
    send_event(
        tx,
        &ServerEvent::RoomError {
            message: "Room not found".to_string(),
        },
    );
}

fn control_error(tx: &ConnectionSender, message: &str) {
    send_event(
        tx,
        &ServerEvent::ControlError {
            message: message.to_string(),
        },
    );
}

fn toggled_event(media: MediaKind, peer_id: &str, enabled: bool, master: bool) -> ServerEvent {
    match media {
        MediaKind::Audio => ServerEvent::AudioToggled {
            peer_id: peer_id.to_string(),
            enabled,
            is_host_master_control: master,
        },
        MediaKind::Video => ServerEvent::VideoToggled {
            peer_id: peer_id.to_string(),
            enabled,
            is_host_master_control: master,
        },
    }
}

fn set_flag(room: &mut Room, connection_id: &str, media: MediaKind, enabled: bool) -> bool {
    let Some(participant) = room.participant_mut(connection_id) else {
        return false;
    };
    match media {
        MediaKind::Audio => participant.audio_enabled = enabled,
        MediaKind::Video => participant.video_enabled = enabled,
    }
    true
}

/// Self toggle of audio or video, with the master-control cascade when
/// the host flips its own track.
pub fn handle_toggle(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    peer_id: &str,
    media: MediaKind,
    enabled: bool,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    if !set_flag(&mut room, connection_id, media, enabled) {
        control_error(tx, "You are not in this room");
        return;
    }

    broadcast_to_room_except(
        &state.connections,
        &room,
        connection_id,
        &toggled_event(media, peer_id, enabled, false),
    );

    let master_enabled = match media {
        MediaKind::Audio => room.host_master_controls.control_all_audio,
        MediaKind::Video => room.host_master_controls.control_all_video,
    };
    if room.is_host(connection_id) && master_enabled {
        cascade_master_control(state, &mut room, connection_id, peer_id, media, enabled);
    }
}

/// Force every other participant's flag to the host's value, notify
/// each one individually, then announce the action room-wide.
fn cascade_master_control(
    state: &AppState,
    room: &mut Room,
    host_id: &str,
    host_peer_id: &str,
    media: MediaKind,
    enabled: bool,
) {
    let host_username = room
        .participant(host_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();

    let forced = ServerEvent::ForcedControl {
        media,
        enabled,
        by_username: host_username.clone(),
    };
    for participant in room.participants_mut() {
        if participant.id == host_id {
            continue;
        }
        match media {
            MediaKind::Audio => participant.audio_enabled = enabled,
            MediaKind::Video => participant.video_enabled = enabled,
        }
        send_to_connection(&state.connections, &participant.id, &forced);
    }

    broadcast_to_room(
        &state.connections,
        room,
        &toggled_event(media, host_peer_id, enabled, true),
    );

    let verb = match (media, enabled) {
        (MediaKind::Audio, true) => "unmuted everyone",
        (MediaKind::Audio, false) => "muted everyone",
        (MediaKind::Video, true) => "enabled everyone's video",
        (MediaKind::Video, false) => "disabled everyone's video",
    };
    let message = ChatMessage::system(
        &format!("{host_username} {verb}"),
        SystemMessageKind::HostAction,
    );
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, room, &ServerEvent::NewMessage { message });
}

/// Screen-share presence flag, relayed to the rest of the room.
pub fn handle_screen_share(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    peer_id: &str,
    is_sharing: bool,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    let Some(participant) = room.participant_mut(connection_id) else {
        control_error(tx, "You are not in this room");
        return;
    };
    participant.is_screen_sharing = is_sharing;

    broadcast_to_room_except(
        &state.connections,
        &room,
        connection_id,
        &ServerEvent::ScreenShareToggled {
            peer_id: peer_id.to_string(),
            is_sharing,
        },
    );
}

/// Host-gated update of the room's master-control flags.
pub fn handle_update_master_controls(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    patch: HostMasterControlsPatch,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    if !room.is_host(connection_id) {
        control_error(tx, "Only the host can change master controls");
        return;
    }

    room.host_master_controls.apply(patch);
    broadcast_to_room(
        &state.connections,
        &room,
        &ServerEvent::HostMasterControlsUpdated {
            controls: room.host_master_controls,
        },
    );

    let host_name = room
        .participant(connection_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();
    let message = ChatMessage::system(
        &format!("{host_name} updated the host master controls"),
        SystemMessageKind::HostAction,
    );
    room.append_message(message.clone());
    broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
}

/// Per-target host control, addressed by the target's external peer id.
/// `force_off = true` mutes/disables (forced); `false` requests the
/// target to unmute/enable locally.
pub fn handle_host_control(
    state: &AppState,
    tx: &ConnectionSender,
    connection_id: &str,
    room_id: &str,
    target_peer_id: &str,
    media: MediaKind,
    force_off: bool,
) {
    let Some(mut room) = state.rooms.get_mut(room_id) else {
        room_not_found(tx);
        return;
    };
    if !room.is_host(connection_id) {
        control_error(tx, "Only the host can control participants");
        return;
    }
    let host_username = room
        .participant(connection_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();

    let Some(target) = room.participant_by_peer_id_mut(target_peer_id) else {
        control_error(tx, "Participant not found");
        return;
    };
    let target_id = target.id.clone();
    let target_username = target.username.clone();

    if force_off {
        match media {
            MediaKind::Audio => target.audio_enabled = false,
            MediaKind::Video => target.video_enabled = false,
        }
        send_to_connection(
            &state.connections,
            &target_id,
            &ServerEvent::ForcedControl {
                media,
                enabled: false,
                by_username: host_username,
            },
        );
        broadcast_to_room(
            &state.connections,
            &room,
            &toggled_event(media, target_peer_id, false, false),
        );
    } else {
        // Request only: the target decides whether to comply.
        send_to_connection(
            &state.connections,
            &target_id,
            &ServerEvent::ControlRequested {
                media,
                by_username: host_username.clone(),
            },
        );
        let message = ChatMessage::system(
            &format!("{host_username} asked {target_username} to enable {media}"),
            SystemMessageKind::HostRequest,
        );
        room.append_message(message.clone());
        broadcast_to_room(&state.connections, &room, &ServerEvent::NewMessage { message });
    }
}
