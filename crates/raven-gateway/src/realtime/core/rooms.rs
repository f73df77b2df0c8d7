//! Room registry: room -> sessions, with the reverse index session -> rooms.
//!
//! Both directions are sharded maps, so rooms are synchronized independently and
//! no operation takes a cross-room lock. An emptied room is removed with
//! `remove_if`, which re-checks emptiness under the shard lock and therefore
//! cannot drop a session that joined in between.

use std::collections::HashSet;

use dashmap::DashMap;

use raven_core::protocol::RoomKey;
use raven_core::SessionId;

#[derive(Default)]
pub struct RoomRegistry {
    room_to_sessions: DashMap<RoomKey, HashSet<SessionId>>,
    session_to_rooms: DashMap<SessionId, HashSet<RoomKey>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn join(&self, session: &SessionId, room: &RoomKey) {
        self.room_to_sessions
            .entry(room.clone())
            .or_default()
            .insert(session.clone());

        self.session_to_rooms
            .entry(session.clone())
            .or_default()
            .insert(room.clone());
    }

    /// Idempotent; leaving a room the session is not in is a no-op.
    pub fn leave(&self, session: &SessionId, room: &RoomKey) {
        if let Some(mut set) = self.session_to_rooms.get_mut(session) {
            set.remove(room);
        }
        self.session_to_rooms.remove_if(session, |_, set| set.is_empty());

        self.remove_member(room, session);
    }

    /// Remove `session` from every room it is in. Returns the rooms it left.
    ///
    /// A broadcast that already took a `members_of` snapshot may still target the
    /// session; delivery to a gone session is a no-op.
    pub fn leave_all(&self, session: &SessionId) -> Vec<RoomKey> {
        let Some((_, rooms)) = self.session_to_rooms.remove(session) else {
            return Vec::new();
        };
        for room in &rooms {
            self.remove_member(room, session);
        }
        rooms.into_iter().collect()
    }

    /// Snapshot copy of the room's members.
    pub fn members_of(&self, room: &RoomKey) -> HashSet<SessionId> {
        self.room_to_sessions
            .get(room)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, session: &SessionId) -> Vec<RoomKey> {
        self.session_to_rooms
            .get(session)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, session: &SessionId, room: &RoomKey) -> bool {
        self.room_to_sessions
            .get(room)
            .is_some_and(|set| set.contains(session))
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.room_to_sessions.len()
    }

    fn remove_member(&self, room: &RoomKey, session: &SessionId) {
        if let Some(mut set) = self.room_to_sessions.get_mut(room) {
            set.remove(session);
        }
        self.room_to_sessions.remove_if(room, |_, set| set.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_core::ChannelId;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[test]
    fn join_is_idempotent() {
        let reg = RoomRegistry::new();
        let room = RoomKey::typing(&ChannelId::from("general"));
        for _ in 0..5 {
            reg.join(&sid("s1"), &room);
        }
        let members = reg.members_of(&room);
        assert_eq!(members.len(), 1);
        assert!(members.contains(&sid("s1")));
        assert_eq!(reg.rooms_of(&sid("s1")), vec![room]);
    }

    #[test]
    fn leave_is_idempotent_and_drops_empty_rooms() {
        let reg = RoomRegistry::new();
        let room = RoomKey::typing(&ChannelId::from("general"));
        reg.leave(&sid("ghost"), &room);
        assert_eq!(reg.room_count(), 0);

        reg.join(&sid("s1"), &room);
        reg.leave(&sid("s1"), &room);
        reg.leave(&sid("s1"), &room);
        assert!(reg.members_of(&room).is_empty());
        assert_eq!(reg.room_count(), 0);
        assert!(reg.rooms_of(&sid("s1")).is_empty());

        reg.join(&sid("s2"), &room);
        assert!(reg.is_member(&sid("s2"), &room));
    }

    #[test]
    fn leave_all_removes_every_membership() {
        let reg = RoomRegistry::new();
        let rooms: Vec<RoomKey> = ["a", "b", "c"]
            .iter()
            .map(|c| RoomKey::typing(&ChannelId::from(*c)))
            .collect();
        for r in &rooms {
            reg.join(&sid("s1"), r);
            reg.join(&sid("s2"), r);
        }

        let mut left = reg.leave_all(&sid("s1"));
        left.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(left, rooms);

        for r in &rooms {
            let members = reg.members_of(r);
            assert!(!members.contains(&sid("s1")));
            assert!(members.contains(&sid("s2")));
        }
        assert!(reg.leave_all(&sid("s1")).is_empty());
    }

    #[test]
    fn members_of_is_a_snapshot() {
        let reg = RoomRegistry::new();
        let room = RoomKey::typing(&ChannelId::from("general"));
        reg.join(&sid("s1"), &room);
        let snap = reg.members_of(&room);
        reg.leave(&sid("s1"), &room);
        assert!(snap.contains(&sid("s1")));
        assert!(reg.members_of(&room).is_empty());
    }
}
