use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

use raven_core::{SessionId, UserId};

/// One session's outbound queue sender.
#[derive(Clone)]
pub struct Connection {
    pub tx: mpsc::Sender<Message>,
}

/// A connected client instance.
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub user: UserId,
    pub conn: Connection,
}

/// Session registry (the connection manager): `session_id -> Session`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: SessionId, user: UserId, conn: Connection) -> Session {
        let session = Session {
            id: id.clone(),
            user,
            conn,
        };
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn remove(&self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|r| r.value().clone())
    }

    pub fn user_of(&self, id: &SessionId) -> Option<UserId> {
        self.sessions.get(id).map(|r| r.value().user.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let (tx, _rx) = mpsc::channel(1);
        Connection { tx }
    }

    #[test]
    fn sessions_resolve_to_their_user_until_removed() {
        let reg = SessionRegistry::new();
        let alice = UserId::from("alice");
        reg.insert(SessionId::from("s1"), alice.clone(), conn());
        reg.insert(SessionId::from("s2"), alice.clone(), conn());
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.user_of(&SessionId::from("s2")), Some(alice));

        assert!(reg.remove(&SessionId::from("s1")).is_some());
        assert!(reg.remove(&SessionId::from("s1")).is_none());
        assert!(reg.user_of(&SessionId::from("s1")).is_none());

        reg.remove(&SessionId::from("s2"));
        assert!(reg.is_empty());
    }
}
