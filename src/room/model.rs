//! In-memory room state: participants, settings, and the bounded message log.
//!
//! A `Room` owns its participant registry and chat history exclusively.
//! `host_id` is the single source of truth for the host role; the
//! `is_host` flag on each participant is derived and re-synchronized by
//! `set_host` on every host change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Maximum number of chat/system messages retained per room.
/// Oldest entries are evicted first — the log is a ring of recent
/// history, not a durable record.
pub const MESSAGE_LOG_CAPACITY: usize = 100;

/// Room-level chat permissions, adjustable by the host at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    pub allow_public_chat: bool,
    pub allow_private_messages: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            allow_public_chat: true,
            allow_private_messages: true,
        }
    }
}

/// Partial update to chat settings; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettingsPatch {
    pub allow_public_chat: Option<bool>,
    pub allow_private_messages: Option<bool>,
}

impl ChatSettings {
    pub fn apply(&mut self, patch: ChatSettingsPatch) {
        if let Some(v) = patch.allow_public_chat {
            self.allow_public_chat = v;
        }
        if let Some(v) = patch.allow_private_messages {
            self.allow_private_messages = v;
        }
    }
}

/// When enabled, the host's own audio/video toggle cascades to every
/// other participant in the room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMasterControls {
    pub control_all_audio: bool,
    pub control_all_video: bool,
}

/// Partial update to master controls; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMasterControlsPatch {
    pub control_all_audio: Option<bool>,
    pub control_all_video: Option<bool>,
}

impl HostMasterControls {
    pub fn apply(&mut self, patch: HostMasterControlsPatch) {
        if let Some(v) = patch.control_all_audio {
            self.control_all_audio = v;
        }
        if let Some(v) = patch.control_all_video {
            self.control_all_video = v;
        }
    }
}

/// One connected user inside a room, keyed by connection id.
///
/// `peer_id` is the media-layer identifier supplied by the client at
/// join time; the server forwards it verbatim and never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub peer_id: String,
    pub joined_at: DateTime<Utc>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub is_screen_sharing: bool,
    pub is_host: bool,
}

impl Participant {
    pub fn new(id: &str, username: &str, peer_id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            peer_id: peer_id.to_string(),
            joined_at: Utc::now(),
            audio_enabled: true,
            video_enabled: true,
            is_screen_sharing: false,
            is_host: false,
        }
    }
}

/// Classification of a chat message for routing and visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum MessageKind {
    Public,
    Private {
        sender_id: String,
        recipient_id: String,
        to_host: bool,
    },
    HostOnly,
    System { system_type: SystemMessageKind },
}

/// What event a system message announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemMessageKind {
    Join,
    Leave,
    Remove,
    HostChange,
    HostAction,
    HostRequest,
}

/// A single immutable entry in a room's message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// Sender username; `None` for system messages.
    pub sender: Option<String>,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

impl ChatMessage {
    pub fn user(sender: &str, body: &str, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: Some(sender.to_string()),
            body: body.to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn system(body: &str, system_type: SystemMessageKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: None,
            body: body.to_string(),
            timestamp: Utc::now(),
            kind: MessageKind::System { system_type },
        }
    }
}

/// A meeting room: participant registry, chat history, and host state.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Weak reference into the participant registry. Revalidated on
    /// every read; never cached long-term by callers.
    pub host_id: Option<String>,
    pub chat_settings: ChatSettings,
    pub host_master_controls: HostMasterControls,
    /// Insertion-ordered. Host succession promotes the first remaining
    /// entry, so ordering must stay deterministic.
    participants: Vec<Participant>,
    messages: VecDeque<ChatMessage>,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            host_id: None,
            chat_settings: ChatSettings::default(),
            host_master_controls: HostMasterControls::default(),
            participants: Vec::new(),
            messages: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn participants_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.iter_mut()
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn participant_by_username(&self, username: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.username == username)
    }

    pub fn participant_by_peer_id(&self, peer_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.peer_id == peer_id)
    }

    pub fn participant_by_peer_id_mut(&mut self, peer_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.peer_id == peer_id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participant(id).is_some()
    }

    /// True iff the given connection id currently holds the host role.
    pub fn is_host(&self, id: &str) -> bool {
        self.host_id.as_deref() == Some(id)
    }

    /// Register a participant. The first member of an empty room becomes
    /// host immediately. A stale entry with the same connection id is
    /// replaced (handles a rejoin racing its own cleanup); the fresh
    /// entry's derived `is_host` flag is re-synchronized from `host_id`,
    /// since a rejoining host would otherwise carry a stale `false`.
    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.retain(|p| p.id != participant.id);
        let first = self.participants.is_empty();
        let id = participant.id.clone();
        self.participants.push(participant);
        let host_id = if first { Some(id) } else { self.host_id.clone() };
        self.set_host(host_id);
    }

    /// Remove a participant, returning the removed entry if present.
    /// Does NOT touch `host_id`; host succession is the caller's job.
    pub fn remove_participant(&mut self, id: &str) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(idx))
    }

    /// Update `host_id` and re-synchronize every participant's derived
    /// `is_host` flag.
    pub fn set_host(&mut self, host_id: Option<String>) {
        self.host_id = host_id;
        for p in &mut self.participants {
            p.is_host = self.host_id.as_deref() == Some(p.id.as_str());
        }
    }

    /// First remaining participant in insertion order, if any. Used for
    /// host succession; no fairness or seniority policy is intended.
    pub fn first_participant_id(&self) -> Option<String> {
        self.participants.first().map(|p| p.id.clone())
    }

    /// Append a message, evicting the oldest entry beyond capacity.
    pub fn append_message(&mut self, message: ChatMessage) {
        if self.messages.len() == MESSAGE_LOG_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The most recent `limit` messages in arrival order.
    pub fn recent_messages(&self, limit: usize) -> impl Iterator<Item = &ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with(n: usize) -> Room {
        let mut room = Room::new("r1".into());
        for i in 0..n {
            room.add_participant(Participant::new(
                &format!("conn-{i}"),
                &format!("user-{i}"),
                &format!("peer-{i}"),
            ));
        }
        room
    }

    #[test]
    fn first_joiner_becomes_host() {
        let room = room_with(3);
        assert_eq!(room.host_id.as_deref(), Some("conn-0"));
        assert!(room.participant("conn-0").unwrap().is_host);
        assert!(!room.participant("conn-1").unwrap().is_host);
        assert!(!room.participant("conn-2").unwrap().is_host);
    }

    #[test]
    fn set_host_resyncs_derived_flags() {
        let mut room = room_with(2);
        room.set_host(Some("conn-1".into()));
        assert!(!room.participant("conn-0").unwrap().is_host);
        assert!(room.participant("conn-1").unwrap().is_host);
        assert!(room.is_host("conn-1"));
        assert!(!room.is_host("conn-0"));
    }

    #[test]
    fn rejoining_host_keeps_derived_flag_in_sync() {
        let mut room = room_with(2);
        // The host rejoins the same room: its entry is replaced wholesale.
        room.add_participant(Participant::new("conn-0", "user-0", "peer-0"));
        assert_eq!(room.host_id.as_deref(), Some("conn-0"));
        assert!(room.participant("conn-0").unwrap().is_host);
        assert!(!room.participant("conn-1").unwrap().is_host);
    }

    #[test]
    fn message_log_evicts_oldest_beyond_capacity() {
        let mut room = room_with(1);
        for i in 0..150 {
            room.append_message(ChatMessage::user(
                "user-0",
                &format!("msg-{i}"),
                MessageKind::Public,
            ));
        }
        assert_eq!(room.message_count(), MESSAGE_LOG_CAPACITY);
        let bodies: Vec<_> = room
            .recent_messages(MESSAGE_LOG_CAPACITY)
            .map(|m| m.body.clone())
            .collect();
        assert_eq!(bodies.first().map(String::as_str), Some("msg-50"));
        assert_eq!(bodies.last().map(String::as_str), Some("msg-149"));
        assert!(!bodies.iter().any(|b| b == "msg-0"));
    }

    #[test]
    fn recent_messages_returns_tail_in_arrival_order() {
        let mut room = room_with(1);
        for i in 0..10 {
            room.append_message(ChatMessage::system(
                &format!("sys-{i}"),
                SystemMessageKind::Join,
            ));
        }
        let tail: Vec<_> = room.recent_messages(3).map(|m| m.body.as_str()).collect();
        assert_eq!(tail, vec!["sys-7", "sys-8", "sys-9"]);
    }

    #[test]
    fn remove_participant_is_none_for_absent_id() {
        let mut room = room_with(1);
        assert!(room.remove_participant("conn-9").is_none());
        assert_eq!(room.participant_count(), 1);
    }
}
