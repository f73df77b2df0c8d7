//! Typing presence.
//!
//! Typing state is a room per channel (`typing:<channel>`). Snapshots are derived
//! from the room on every event and never cached: members -> users (sessions that
//! vanished in the meantime are skipped) -> de-duplicated, sorted user list.
//!
//! Audiences differ per event:
//! - query: only the asking session
//! - start/stop/disconnect: everyone viewing the channel (`doc:Raven Channel/<id>`),
//!   which is not the typing room itself

use std::collections::BTreeSet;

use async_trait::async_trait;

use raven_core::error::{RavenError, Result};
use raven_core::model::TypingEvent;
use raven_core::protocol::inbound::{GET_TYPERS, TYPING, TYPING_STOPPED};
use raven_core::protocol::{ClientEvent, RoomKey, ServerEvent};
use raven_core::{ChannelId, SessionId};

use crate::dispatch::EventService;
use crate::realtime::{Outgoing, RealtimeCore, RealtimeCtx};

#[derive(Default)]
pub struct TypingService;

impl TypingService {
    pub fn new() -> Self {
        Self
    }

    /// Current typers of `channel`, one entry per user.
    pub fn snapshot(core: &RealtimeCore, channel: &ChannelId) -> TypingEvent {
        let users: BTreeSet<_> = core
            .rooms
            .members_of(&RoomKey::typing(channel))
            .iter()
            .filter_map(|sid| core.sessions.user_of(sid))
            .collect();

        TypingEvent {
            channel: channel.clone(),
            users: users.into_iter().collect(),
        }
    }

    /// Answer "who is typing" to the asking session only.
    pub fn get_typers(&self, ctx: &RealtimeCtx, channel: &ChannelId) -> Result<()> {
        let snap = Self::snapshot(ctx.core(), channel);
        ctx.reply(Outgoing::lossy(ServerEvent::Typers(snap)))
    }

    pub fn start_typing(&self, ctx: &RealtimeCtx, channel: &ChannelId) -> Result<()> {
        ctx.join_room(&RoomKey::typing(channel));
        Self::notify_audience(ctx.core(), channel)
    }

    pub fn stop_typing(&self, ctx: &RealtimeCtx, channel: &ChannelId) -> Result<()> {
        ctx.leave_room(&RoomKey::typing(channel));
        Self::notify_audience(ctx.core(), channel)
    }

    /// Disconnect cleanup: drop the session everywhere and refresh the typer list
    /// of every channel it was typing in.
    pub fn on_disconnect(core: &RealtimeCore, session: &SessionId) {
        for room in core.disconnect(session) {
            let Some(channel) = room.typing_channel() else { continue };
            if let Err(e) = Self::notify_audience(core, &channel) {
                tracing::debug!(%channel, error = %e, "typing cleanup broadcast failed");
            }
        }
    }

    fn notify_audience(core: &RealtimeCore, channel: &ChannelId) -> Result<()> {
        let snap = Self::snapshot(core, channel);
        let reached = core.publish_room_lossy(
            &RoomKey::channel_audience(channel),
            Outgoing::lossy(ServerEvent::Typers(snap)),
        )?;
        tracing::trace!(%channel, reached, "typers broadcast");
        Ok(())
    }
}

#[async_trait]
impl EventService for TypingService {
    fn name(&self) -> &'static str {
        "typing"
    }

    fn events(&self) -> &'static [&'static str] {
        &[GET_TYPERS, TYPING, TYPING_STOPPED]
    }

    async fn handle(&self, ctx: RealtimeCtx, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::GetTypers(channel) => self.get_typers(&ctx, &channel),
            ClientEvent::Typing(channel) => self.start_typing(&ctx, &channel),
            ClientEvent::TypingStopped(channel) => self.stop_typing(&ctx, &channel),
            other => Err(RavenError::BadRequest(format!(
                "typing service cannot handle {}",
                other.name()
            ))),
        }
    }
}
