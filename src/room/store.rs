//! Process-wide room table with delayed destruction of empty rooms.
//!
//! Rooms live in a `DashMap`; an entry guard obtained via `get_mut` is
//! held for the duration of one logical operation, which gives each
//! room single-writer semantics without a global lock.
//!
//! Destruction is deferred: when a room empties, a one-shot timer is
//! armed for the grace window. Timers are keyed by a per-room
//! generation counter — re-arming supersedes the pending timer instead
//! of stacking a second one, and the fire path re-validates that the
//! room is still present, still empty, and the generation is current
//! before removing anything.

use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::room::model::Room;

/// Default grace window before an empty room is destroyed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RoomStore {
    rooms: DashMap<String, Room>,
    /// room id -> generation of the currently armed destruction timer.
    pending_destructions: DashMap<String, u64>,
    grace: Duration,
}

impl RoomStore {
    pub fn new(grace: Duration) -> Self {
        Self {
            rooms: DashMap::new(),
            pending_destructions: DashMap::new(),
            grace,
        }
    }

    /// Create an empty room with default settings and return its id.
    /// Never fails.
    pub fn create_room(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.rooms.insert(id.clone(), Room::new(id.clone()));
        tracing::info!(room_id = %id, "Room created");
        id
    }

    pub fn get(&self, room_id: &str) -> Option<Ref<'_, String, Room>> {
        self.rooms.get(room_id)
    }

    /// Exclusive access to one room. The returned guard must not be
    /// held across an `.await`.
    pub fn get_mut(&self, room_id: &str) -> Option<RefMut<'_, String, Room>> {
        self.rooms.get_mut(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// The id of the (at most one) room containing this connection.
    pub fn room_of_connection(&self, connection_id: &str) -> Option<String> {
        self.rooms
            .iter()
            .find(|entry| entry.value().contains(connection_id))
            .map(|entry| entry.key().clone())
    }

    /// Arm the destruction timer for a room that just became empty.
    /// Supersedes any pending timer for the same room.
    pub fn schedule_destruction(self: Arc<Self>, room_id: &str) {
        let generation = {
            let mut entry = self
                .pending_destructions
                .entry(room_id.to_string())
                .or_insert(0);
            *entry += 1;
            *entry
        };

        tracing::debug!(room_id = %room_id, generation, "Room empty, destruction scheduled");

        let room_id = room_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(self.grace).await;
            self.destroy_if_still_empty(&room_id, generation);
        });
    }

    /// Cancel a pending destruction, if any. Called on join. Bumps the
    /// generation rather than clearing it: a removed entry would let the
    /// next `schedule_destruction` count back up to a generation an
    /// in-flight timer is still sleeping on.
    pub fn cancel_destruction(&self, room_id: &str) {
        if let Some(mut entry) = self.pending_destructions.get_mut(room_id) {
            *entry += 1;
        }
    }

    /// Fire path: the room may have been re-joined, re-emptied (newer
    /// timer), or already destroyed since this timer was armed. The
    /// generation entry stays put unless the room is destroyed, keeping
    /// the counter monotonic for the room's lifetime.
    fn destroy_if_still_empty(&self, room_id: &str, generation: u64) {
        let current = self
            .pending_destructions
            .get(room_id)
            .map(|entry| *entry.value());
        if current != Some(generation) {
            return;
        }
        let still_empty = self
            .rooms
            .get(room_id)
            .map(|room| room.is_empty())
            .unwrap_or(false);
        if still_empty {
            self.rooms.remove(room_id);
            self.pending_destructions.remove(room_id);
            tracing::info!(room_id = %room_id, "Empty room destroyed after grace window");
        }
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::model::Participant;
    use std::time::Duration;

    #[tokio::test]
    async fn created_room_is_retrievable_with_defaults() {
        let store = Arc::new(RoomStore::new(DEFAULT_GRACE));
        let id = store.create_room();
        let room = store.get(&id).unwrap();
        assert!(room.is_empty());
        assert!(room.host_id.is_none());
        assert!(room.chat_settings.allow_public_chat);
        assert!(!room.host_master_controls.control_all_audio);
    }

    #[tokio::test]
    async fn empty_room_destroyed_after_grace_but_not_before() {
        let store = Arc::new(RoomStore::new(Duration::from_millis(100)));
        let id = store.create_room();
        store.clone().schedule_destruction(&id);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get(&id).is_some(), "destroyed before grace elapsed");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(&id).is_none(), "survived past grace window");
    }

    #[tokio::test]
    async fn join_within_grace_cancels_destruction() {
        let store = Arc::new(RoomStore::new(Duration::from_millis(80)));
        let id = store.create_room();
        store.clone().schedule_destruction(&id);

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.cancel_destruction(&id);
        store
            .get_mut(&id)
            .unwrap()
            .add_participant(Participant::new("c1", "alice", "peer-1"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get(&id).is_some(), "cancelled timer still fired");
    }

    #[tokio::test]
    async fn rearming_supersedes_stale_timer() {
        let store = Arc::new(RoomStore::new(Duration::from_millis(60)));
        let id = store.create_room();

        // First empty transition.
        store.clone().schedule_destruction(&id);
        // A join and a second empty transition before the first timer fires.
        store.cancel_destruction(&id);
        store.clone().schedule_destruction(&id);

        // Only the second timer may destroy; when it fires the room is
        // still empty, so the room goes away exactly once.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get(&id).is_none());
    }

    #[tokio::test]
    async fn rescued_then_reemptied_room_keeps_its_full_grace_window() {
        let store = Arc::new(RoomStore::new(Duration::from_millis(100)));
        let id = store.create_room();
        store.clone().schedule_destruction(&id);

        // Rescue halfway through the window.
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.cancel_destruction(&id);
        store
            .get_mut(&id)
            .unwrap()
            .add_participant(Participant::new("c1", "alice", "peer-1"));

        // Re-empty before the first timer would have fired.
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.get_mut(&id).unwrap().remove_participant("c1");
        store.clone().schedule_destruction(&id);

        // The superseded first timer fires inside the new window and
        // must not win: the second empty transition gets a full grace.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            store.get(&id).is_some(),
            "room destroyed before its grace window elapsed"
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            store.get(&id).is_none(),
            "current timer never destroyed the room"
        );
    }

    #[tokio::test]
    async fn occupied_room_survives_stale_timer_fire() {
        let store = Arc::new(RoomStore::new(Duration::from_millis(40)));
        let id = store.create_room();
        store.clone().schedule_destruction(&id);
        store
            .get_mut(&id)
            .unwrap()
            .add_participant(Participant::new("c1", "alice", "peer-1"));
        // Timer was never cancelled, but the fire path re-checks emptiness.
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert!(store.get(&id).is_some());
    }

    #[tokio::test]
    async fn room_of_connection_finds_the_single_room() {
        let store = Arc::new(RoomStore::new(DEFAULT_GRACE));
        let a = store.create_room();
        let _b = store.create_room();
        store
            .get_mut(&a)
            .unwrap()
            .add_participant(Participant::new("c1", "alice", "peer-1"));
        assert_eq!(store.room_of_connection("c1"), Some(a));
        assert_eq!(store.room_of_connection("nope"), None);
    }
}
