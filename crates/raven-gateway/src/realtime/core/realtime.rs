use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{timeout, Duration};

use raven_core::error::Result;
use raven_core::protocol::RoomKey;
use raven_core::{SessionId, UserId};

use crate::realtime::core::{Connection, RoomRegistry, Session, SessionRegistry};
use crate::realtime::types::{Outgoing, PreparedMsg, QoS};

static EGRESS_DROPS: AtomicU64 = AtomicU64::new(0);
static EGRESS_SEND_FAILS: AtomicU64 = AtomicU64::new(0);

/// Messages dropped because a session's outbound queue was full.
pub fn egress_drop_count() -> u64 {
    EGRESS_DROPS.load(Ordering::Relaxed)
}

/// Messages not delivered because the session was gone or the send timed out.
pub fn egress_send_fail_count() -> u64 {
    EGRESS_SEND_FAILS.load(Ordering::Relaxed)
}

/// RealtimeCore: connection manager + egress engine (send to session / publish to room).
pub struct RealtimeCore {
    pub sessions: Arc<SessionRegistry>,
    pub rooms: Arc<RoomRegistry>,
}

impl Default for RealtimeCore {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeCore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            rooms: Arc::new(RoomRegistry::new()),
        }
    }

    /// Register a new session and join it to its user's delivery room.
    pub fn connect(&self, id: SessionId, user: UserId, conn: Connection) -> Session {
        let session = self.sessions.insert(id, user, conn);
        self.rooms.join(&session.id, &RoomKey::user(&session.user));
        tracing::debug!(session = %session.id, user = %session.user, "session connected");
        session
    }

    /// Drop the session and all its memberships. Returns the rooms it left.
    pub fn disconnect(&self, id: &SessionId) -> Vec<RoomKey> {
        let left = self.rooms.leave_all(id);
        if self.sessions.remove(id).is_some() {
            tracing::debug!(session = %id, rooms = left.len(), "session disconnected");
        }
        left
    }

    /// Unicast to one session. A session that is already gone is a no-op.
    pub fn send_to_session(&self, id: &SessionId, out: Outgoing) -> Result<()> {
        let prepared = PreparedMsg::prepare(&out)?;
        match self.sessions.get(id) {
            Some(session) => {
                try_deliver(&session.conn, &prepared);
            }
            None => {
                EGRESS_SEND_FAILS.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Lossy broadcast: try_send only, drop if a queue is full.
    /// Returns the number of sessions the message was queued for.
    pub fn publish_room_lossy(&self, room: &RoomKey, out: Outgoing) -> Result<usize> {
        let prepared = PreparedMsg::prepare(&out)?;
        let mut queued = 0;
        for sid in self.rooms.members_of(room) {
            if let Some(session) = self.sessions.get(&sid) {
                if try_deliver(&session.conn, &prepared) {
                    queued += 1;
                }
            }
        }
        Ok(queued)
    }

    /// Reliable broadcast: send concurrently with optional timeout per session.
    pub async fn publish_room_reliable(&self, room: &RoomKey, out: Outgoing) -> Result<usize> {
        let prepared = PreparedMsg::prepare(&out)?;

        let (timeout_ms, do_timeout) = match out.qos {
            QoS::Reliable { timeout_ms } => (timeout_ms, timeout_ms > 0),
            QoS::Lossy => (0, false),
        };

        let mut futs = FuturesUnordered::new();
        for sid in self.rooms.members_of(room) {
            if let Some(session) = self.sessions.get(&sid) {
                let msg = prepared.to_ws_message();
                let tx = session.conn.tx;
                futs.push(async move {
                    let sent = if do_timeout {
                        matches!(timeout(Duration::from_millis(timeout_ms), tx.send(msg)).await, Ok(Ok(())))
                    } else {
                        tx.send(msg).await.is_ok()
                    };
                    if !sent {
                        EGRESS_SEND_FAILS.fetch_add(1, Ordering::Relaxed);
                    }
                    sent
                });
            }
        }

        let mut delivered = 0;
        while let Some(sent) = futs.next().await {
            if sent {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Dispatch on the message's own QoS.
    pub async fn publish_room(&self, room: &RoomKey, out: Outgoing) -> Result<usize> {
        match out.qos {
            QoS::Lossy => self.publish_room_lossy(room, out),
            QoS::Reliable { .. } => self.publish_room_reliable(room, out).await,
        }
    }
}

fn try_deliver(conn: &Connection, prepared: &PreparedMsg) -> bool {
    match conn.tx.try_send(prepared.to_ws_message()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            EGRESS_DROPS.fetch_add(1, Ordering::Relaxed);
            false
        }
        Err(TrySendError::Closed(_)) => {
            EGRESS_SEND_FAILS.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

/// Per-event context passed to services (borrow tools instead of owning).
#[derive(Clone)]
pub struct RealtimeCtx {
    session: SessionId,
    user: UserId,
    core: Arc<RealtimeCore>,
}

impl RealtimeCtx {
    pub fn new(session: SessionId, user: UserId, core: Arc<RealtimeCore>) -> Self {
        Self { session, user, core }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn core(&self) -> &RealtimeCore {
        &self.core
    }

    pub fn join_room(&self, room: &RoomKey) {
        self.core.rooms.join(&self.session, room);
    }

    pub fn leave_room(&self, room: &RoomKey) {
        self.core.rooms.leave(&self.session, room);
    }

    /// Send to the session that raised the event.
    pub fn reply(&self, out: Outgoing) -> Result<()> {
        self.core.send_to_session(&self.session, out)
    }

    pub fn publish_room_lossy(&self, room: &RoomKey, out: Outgoing) -> Result<usize> {
        self.core.publish_room_lossy(room, out)
    }
}
