//! Unread partition.
//!
//! `reconcile` is a pure function of its inputs: no I/O, no shared state, safe to
//! call on every render. Input order is preserved inside each bucket; sorting is
//! the caller's business.

use std::collections::HashMap;

use serde::Serialize;

use raven_core::model::{ChannelMetadata, ChannelType};
use raven_core::ChannelId;

/// A channel plus its unread count, serialized flat (`{...channel, unread_count}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelWithUnreadCount {
    #[serde(flatten)]
    pub channel: ChannelMetadata,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnreadPartition {
    pub unread_channels: Vec<ChannelWithUnreadCount>,
    pub read_channels: Vec<ChannelWithUnreadCount>,
    pub unread_dms: Vec<ChannelWithUnreadCount>,
    pub read_dms: Vec<ChannelWithUnreadCount>,
}

impl UnreadPartition {
    pub fn total_unread(&self) -> u64 {
        self.unread_channels
            .iter()
            .chain(&self.unread_dms)
            .map(|c| u64::from(c.unread_count))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.unread_channels.len() + self.read_channels.len() + self.unread_dms.len() + self.read_dms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Which bucket `channel` landed in, if any.
    pub fn find(&self, channel: &ChannelId) -> Option<&ChannelWithUnreadCount> {
        self.unread_channels
            .iter()
            .chain(&self.read_channels)
            .chain(&self.unread_dms)
            .chain(&self.read_dms)
            .find(|c| &c.channel.name == channel)
    }
}

/// Whether a channel takes part in the unread partition at all.
///
/// Archived channels never do. DMs and `Open` channels always do (everyone is a
/// member). `Public` and `Private` channels need a membership record; a missing
/// one means "not a member".
///
/// The two membership rules pull in different directions here. The partition
/// rule hides only `Public` channels without a record, while the error rule
/// hides every non-public type without one, which would include `Open`. `Open`
/// channels have no per-user membership (anyone may read them), so a missing
/// record carries no meaning for them and they stay listed. `Private` channels
/// follow the error rule and are hidden.
pub fn is_listed(channel: &ChannelMetadata) -> bool {
    if channel.is_archived {
        return false;
    }
    if channel.is_direct_message {
        return true;
    }
    match channel.channel_type {
        ChannelType::Open => true,
        ChannelType::Public | ChannelType::Private => channel.is_member(),
    }
}

pub fn reconcile(
    channels: &[ChannelMetadata],
    dm_channels: &[ChannelMetadata],
    counts: &HashMap<ChannelId, u32>,
) -> UnreadPartition {
    let mut out = UnreadPartition::default();

    for channel in channels.iter().chain(dm_channels).filter(|c| is_listed(c)) {
        let unread_count = counts.get(&channel.name).copied().unwrap_or(0);
        let item = ChannelWithUnreadCount {
            channel: channel.clone(),
            unread_count,
        };
        let bucket = match (unread_count > 0, channel.is_direct_message) {
            (true, true) => &mut out.unread_dms,
            (true, false) => &mut out.unread_channels,
            (false, true) => &mut out.read_dms,
            (false, false) => &mut out.read_channels,
        };
        bucket.push(item);
    }

    out
}
