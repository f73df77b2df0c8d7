//! Client-side view of the latest typer snapshot per channel.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use raven_core::model::TypingEvent;
use raven_core::{ChannelId, UserId};

#[derive(Default)]
pub struct TypingIndicators {
    by_channel: RwLock<HashMap<ChannelId, Vec<UserId>>>,
}

impl TypingIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots replace, never merge.
    pub fn apply(&self, event: TypingEvent) {
        let mut map = self.by_channel.write().unwrap_or_else(PoisonError::into_inner);
        if event.users.is_empty() {
            map.remove(&event.channel);
        } else {
            map.insert(event.channel, event.users);
        }
    }

    pub fn typers(&self, channel: &ChannelId) -> Vec<UserId> {
        self.by_channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Typers other than `me`; what a typing indicator shows.
    pub fn typers_excluding(&self, channel: &ChannelId, me: &UserId) -> Vec<UserId> {
        let mut users = self.typers(channel);
        users.retain(|u| u != me);
        users
    }

    /// Forget everything (after a reconnect the server state is unknown).
    pub fn clear(&self) {
        self.by_channel.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_replace_and_exclude_self() {
        let t = TypingIndicators::new();
        let general = ChannelId::from("general");
        t.apply(TypingEvent {
            channel: general.clone(),
            users: vec![UserId::from("alice"), UserId::from("me")],
        });
        assert_eq!(t.typers_excluding(&general, &UserId::from("me")), vec![UserId::from("alice")]);

        t.apply(TypingEvent {
            channel: general.clone(),
            users: vec![],
        });
        assert!(t.typers(&general).is_empty());
    }
}
