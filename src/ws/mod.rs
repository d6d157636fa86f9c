pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's outbound channel. Any part
/// of the system can clone this to push events to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Connection registry: one live transport connection per connection id.
/// The connection id doubles as the participant id inside rooms.
pub type ConnectionRegistry = Arc<DashMap<String, ConnectionSender>>;

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    Arc::new(DashMap::new())
}
