//! HTTP surface: WebSocket upgrade plus thin synchronous snapshot
//! reads over the same in-memory state. The REST side never mutates a
//! room.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::room::model::{MessageKind, Room};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// How many entries the snapshot's recent-message digest carries.
const DIGEST_LIMIT: usize = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub username: String,
    pub joined_at: DateTime<Utc>,
    pub is_host: bool,
    pub is_screen_sharing: bool,
}

/// Compact history entry: enough for a lobby preview, no bodies of
/// private traffic are exposed here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDigest {
    pub sender: Option<String>,
    pub kind: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub host_id: Option<String>,
    pub participant_count: usize,
    pub participants: Vec<ParticipantSummary>,
    pub chat_settings: crate::room::model::ChatSettings,
    pub host_master_controls: crate::room::model::HostMasterControls,
    pub message_count: usize,
    pub recent_messages: Vec<MessageDigest>,
}

impl RoomSnapshot {
    fn of(room: &Room) -> Self {
        Self {
            room_id: room.id.clone(),
            created_at: room.created_at,
            host_id: room.host_id.clone(),
            participant_count: room.participant_count(),
            participants: room
                .participants()
                .map(|p| ParticipantSummary {
                    username: p.username.clone(),
                    joined_at: p.joined_at,
                    is_host: p.is_host,
                    is_screen_sharing: p.is_screen_sharing,
                })
                .collect(),
            chat_settings: room.chat_settings,
            host_master_controls: room.host_master_controls,
            message_count: room.message_count(),
            recent_messages: room
                .recent_messages(DIGEST_LIMIT)
                .map(|m| MessageDigest {
                    sender: m.sender.clone(),
                    kind: match m.kind {
                        MessageKind::Public => "public",
                        MessageKind::Private { .. } => "private",
                        MessageKind::HostOnly => "host-only",
                        MessageKind::System { .. } => "system",
                    },
                    timestamp: m.timestamp,
                })
                .collect(),
        }
    }
}

/// GET /api/rooms/{room_id} — read-only snapshot of one room.
async fn room_snapshot(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, (StatusCode, String)> {
    state
        .rooms
        .get(&room_id)
        .map(|room| Json(RoomSnapshot::of(&room)))
        .ok_or((StatusCode::NOT_FOUND, "Room not found".to_string()))
}

/// GET /health — liveness probe for deployment checks.
async fn health() -> &'static str {
    "ok"
}

/// Build the full axum Router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/rooms/{room_id}", get(room_snapshot))
        .route("/ws", get(ws_handler::ws_upgrade))
        .with_state(state)
}
