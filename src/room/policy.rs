//! Chat permission and visibility decisions.
//!
//! Pure functions over current room state — no side effects, no I/O.
//! Send-path failures surface as requester-only error events at the
//! call sites and never mutate the room.

use crate::room::model::{ChatMessage, MessageKind, Room};

/// Why a send was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendDenied {
    /// Privilege check failed (non-host attempting a host-gated action,
    /// or a chat mode disabled by room settings).
    Forbidden,
    /// The named recipient or host target does not resolve to a live
    /// participant.
    RecipientNotFound,
}

impl std::fmt::Display for SendDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendDenied::Forbidden => write!(f, "You are not allowed to send this message"),
            SendDenied::RecipientNotFound => write!(f, "Recipient not found in this room"),
        }
    }
}

/// Whether `message` may be shown to the participant `viewer_id`.
///
/// The host can see everything a non-host can see, plus all private
/// traffic (host audit) and host-only announcements.
pub fn visible(message: &ChatMessage, viewer_id: &str, room: &Room) -> bool {
    let viewer_is_host = room.is_host(viewer_id);
    match &message.kind {
        MessageKind::System { .. } => true,
        MessageKind::Public => room.chat_settings.allow_public_chat || viewer_is_host,
        MessageKind::HostOnly => viewer_is_host,
        MessageKind::Private {
            sender_id,
            recipient_id,
            to_host,
        } => {
            viewer_id == sender_id
                || viewer_id == recipient_id
                || (*to_host && viewer_is_host)
                || viewer_is_host
        }
    }
}

/// Permission check for a public send.
pub fn check_public_send(room: &Room, sender_id: &str) -> Result<(), SendDenied> {
    if room.chat_settings.allow_public_chat || room.is_host(sender_id) {
        Ok(())
    } else {
        Err(SendDenied::Forbidden)
    }
}

/// Permission check plus recipient resolution for a private send.
///
/// Returns the resolved recipient's connection id. With `to_host` the
/// recipient is the current host.
pub fn check_private_send(
    room: &Room,
    sender_id: &str,
    recipient_username: Option<&str>,
    to_host: bool,
) -> Result<String, SendDenied> {
    if !room.chat_settings.allow_private_messages && !room.is_host(sender_id) {
        return Err(SendDenied::Forbidden);
    }
    if to_host {
        return room
            .host_id
            .clone()
            .filter(|id| room.contains(id))
            .ok_or(SendDenied::RecipientNotFound);
    }
    recipient_username
        .and_then(|name| room.participant_by_username(name))
        .map(|p| p.id.clone())
        .ok_or(SendDenied::RecipientNotFound)
}

/// Permission check for a host-only announcement.
pub fn check_host_send(room: &Room, sender_id: &str) -> Result<(), SendDenied> {
    if room.is_host(sender_id) {
        Ok(())
    } else {
        Err(SendDenied::Forbidden)
    }
}
