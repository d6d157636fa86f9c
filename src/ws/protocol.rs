//! JSON event protocol and dispatch.
//!
//! Every frame is a JSON object tagged by `event`, mirroring the named
//! events of the meeting client. Unknown events and malformed payloads
//! are rejected with a requester-only error rather than dropped
//! silently, so misbehaving clients get a diagnostic.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::chat;
use crate::lifecycle;
use crate::media;
use crate::moderation;
use crate::room::model::{
    ChatMessage, ChatSettings, ChatSettingsPatch, HostMasterControls, HostMasterControlsPatch,
    Participant, SystemMessageKind,
};
use crate::state::AppState;
use crate::ws::ConnectionSender;

/// Which media track a control action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Client → server events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    CreateRoom,
    Join {
        room_id: String,
        username: String,
        peer_id: String,
    },
    SendPublicMessage {
        room_id: String,
        username: String,
        body: String,
    },
    SendPrivateMessage {
        room_id: String,
        username: String,
        body: String,
        #[serde(default)]
        recipient_username: Option<String>,
        #[serde(default)]
        to_host: bool,
    },
    SendHostMessage {
        room_id: String,
        username: String,
        body: String,
    },
    SendSystemMessage {
        room_id: String,
        body: String,
        system_type: SystemMessageKind,
    },
    TypingIndicator {
        room_id: String,
        username: String,
        is_typing: bool,
    },
    ToggleAudio {
        room_id: String,
        peer_id: String,
        enabled: bool,
    },
    ToggleVideo {
        room_id: String,
        peer_id: String,
        enabled: bool,
    },
    ScreenShare {
        room_id: String,
        peer_id: String,
        is_sharing: bool,
    },
    UpdateChatSettings {
        room_id: String,
        #[serde(default)]
        settings: ChatSettingsPatch,
    },
    UpdateHostMasterControls {
        room_id: String,
        #[serde(default)]
        controls: HostMasterControlsPatch,
    },
    HostControlAudio {
        room_id: String,
        target_peer_id: String,
        /// true = force-mute the target; false = ask it to unmute.
        mute: bool,
    },
    HostControlVideo {
        room_id: String,
        target_peer_id: String,
        /// true = force-disable the target's camera; false = ask it to enable.
        disable: bool,
    },
    RemoveParticipant {
        room_id: String,
        target_id: String,
        peer_id: String,
    },
    TransferHost {
        room_id: String,
        new_host_id: String,
    },
    LivenessProbe,
}

/// Server → client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomCreated {
        room_id: String,
    },
    /// Tells a connection whether it currently holds the host role.
    HostStatus {
        is_host: bool,
    },
    RoomInfo {
        room_id: String,
        created_at: chrono::DateTime<chrono::Utc>,
        host_id: Option<String>,
    },
    MessageHistory {
        messages: Vec<ChatMessage>,
    },
    ChatSettingsUpdated {
        settings: ChatSettings,
    },
    HostMasterControlsUpdated {
        controls: HostMasterControls,
    },
    /// Current members, excluding the recipient itself. Sent once on join.
    ParticipantList {
        participants: Vec<Participant>,
    },
    UserJoined {
        participant: Participant,
    },
    UserLeft {
        id: String,
        username: String,
        peer_id: String,
    },
    NewMessage {
        message: ChatMessage,
    },
    Typing {
        username: String,
        is_typing: bool,
    },
    AudioToggled {
        peer_id: String,
        enabled: bool,
        is_host_master_control: bool,
    },
    VideoToggled {
        peer_id: String,
        enabled: bool,
        is_host_master_control: bool,
    },
    ScreenShareToggled {
        peer_id: String,
        is_sharing: bool,
    },
    /// Individually addressed: the host force-set this client's track state.
    ForcedControl {
        media: MediaKind,
        enabled: bool,
        by_username: String,
    },
    /// Individually addressed: the host asks this client to re-enable a
    /// track locally. State is not forced.
    ControlRequested {
        media: MediaKind,
        by_username: String,
    },
    HostChanged {
        new_host_id: String,
        new_host_username: String,
    },
    /// Sent to the removed participant itself before its socket closes.
    RemovedFromRoom,
    ParticipantRemoved {
        id: String,
        peer_id: String,
        username: String,
    },
    Pong,
    /// Room-level failure (unknown room id). Requester only.
    RoomError {
        message: String,
    },
    /// Chat permission or addressing failure. Requester only.
    ChatError {
        message: String,
    },
    /// Control/moderation permission or addressing failure. Requester only.
    ControlError {
        message: String,
    },
}

/// Serialize an event and push it to one connection's outbound channel.
/// Fire-and-forget: a closed channel means the connection already
/// departed, and delivery is silently dropped.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        let _ = tx.send(Message::Text(text.into()));
    }
}

/// Handle one incoming text frame: decode, dispatch, respond.
pub fn handle_text_message(
    text: &str,
    tx: &ConnectionSender,
    state: &AppState,
    connection_id: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                "Failed to decode client event"
            );
            send_event(
                tx,
                &ServerEvent::RoomError {
                    message: "Malformed event".to_string(),
                },
            );
            return;
        }
    };

    dispatch_event(event, tx, state, connection_id);
}

fn dispatch_event(
    event: ClientEvent,
    tx: &ConnectionSender,
    state: &AppState,
    connection_id: &str,
) {
    match event {
        ClientEvent::CreateRoom => {
            let room_id = state.rooms.create_room();
            send_event(tx, &ServerEvent::RoomCreated { room_id });
        }
        ClientEvent::Join {
            room_id,
            username,
            peer_id,
        } => {
            lifecycle::handle_join(state, tx, connection_id, &room_id, &username, &peer_id);
        }
        ClientEvent::SendPublicMessage {
            room_id,
            username,
            body,
        } => {
            chat::messages::handle_public_message(
                state,
                tx,
                connection_id,
                &room_id,
                &username,
                &body,
            );
        }
        ClientEvent::SendPrivateMessage {
            room_id,
            username,
            body,
            recipient_username,
            to_host,
        } => {
            chat::messages::handle_private_message(
                state,
                tx,
                connection_id,
                &room_id,
                &username,
                &body,
                recipient_username.as_deref(),
                to_host,
            );
        }
        ClientEvent::SendHostMessage {
            room_id,
            username,
            body,
        } => {
            chat::messages::handle_host_message(
                state,
                tx,
                connection_id,
                &room_id,
                &username,
                &body,
            );
        }
        ClientEvent::SendSystemMessage {
            room_id,
            body,
            system_type,
        } => {
            chat::messages::handle_system_message(state, tx, &room_id, &body, system_type);
        }
        ClientEvent::TypingIndicator {
            room_id,
            username,
            is_typing,
        } => {
            chat::messages::handle_typing_indicator(
                state,
                connection_id,
                &room_id,
                &username,
                is_typing,
            );
        }
        ClientEvent::ToggleAudio {
            room_id,
            peer_id,
            enabled,
        } => {
            media::controls::handle_toggle(
                state,
                tx,
                connection_id,
                &room_id,
                &peer_id,
                MediaKind::Audio,
                enabled,
            );
        }
        ClientEvent::ToggleVideo {
            room_id,
            peer_id,
            enabled,
        } => {
            media::controls::handle_toggle(
                state,
                tx,
                connection_id,
                &room_id,
                &peer_id,
                MediaKind::Video,
                enabled,
            );
        }
        ClientEvent::ScreenShare {
            room_id,
            peer_id,
            is_sharing,
        } => {
            media::controls::handle_screen_share(
                state,
                tx,
                connection_id,
                &room_id,
                &peer_id,
                is_sharing,
            );
        }
        ClientEvent::UpdateChatSettings { room_id, settings } => {
            chat::messages::handle_update_chat_settings(
                state,
                tx,
                connection_id,
                &room_id,
                settings,
            );
        }
        ClientEvent::UpdateHostMasterControls { room_id, controls } => {
            media::controls::handle_update_master_controls(
                state,
                tx,
                connection_id,
                &room_id,
                controls,
            );
        }
        ClientEvent::HostControlAudio {
            room_id,
            target_peer_id,
            mute,
        } => {
            media::controls::handle_host_control(
                state,
                tx,
                connection_id,
                &room_id,
                &target_peer_id,
                MediaKind::Audio,
                mute,
            );
        }
        ClientEvent::HostControlVideo {
            room_id,
            target_peer_id,
            disable,
        } => {
            media::controls::handle_host_control(
                state,
                tx,
                connection_id,
                &room_id,
                &target_peer_id,
                MediaKind::Video,
                disable,
            );
        }
        ClientEvent::RemoveParticipant {
            room_id,
            target_id,
            peer_id,
        } => {
            moderation::remove::handle_remove_participant(
                state,
                tx,
                connection_id,
                &room_id,
                &target_id,
                &peer_id,
            );
        }
        ClientEvent::TransferHost {
            room_id,
            new_host_id,
        } => {
            moderation::host::handle_transfer_host(
                state,
                tx,
                connection_id,
                &room_id,
                &new_host_id,
            );
        }
        ClientEvent::LivenessProbe => {
            send_event(tx, &ServerEvent::Pong);
        }
    }
}
