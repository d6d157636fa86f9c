use std::sync::Arc;
use std::time::Duration;

use crate::room::store::RoomStore;
use crate::ws::{self, ConnectionRegistry};

/// Shared application state passed to all handlers via the axum State
/// extractor. Explicit handle, no ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide room table with delayed destruction of empty rooms.
    pub rooms: Arc<RoomStore>,
    /// Active WebSocket connections keyed by connection id.
    pub connections: ConnectionRegistry,
}

impl AppState {
    /// Build fresh state with the given empty-room grace window.
    pub fn new(room_grace: Duration) -> Self {
        Self {
            rooms: Arc::new(RoomStore::new(room_grace)),
            connections: ws::new_connection_registry(),
        }
    }
}
