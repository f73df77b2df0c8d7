//! Data model shared by the realtime gateway and the client sync layer.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, UserId};

/// Doctype of channel documents; the channel audience room is keyed by it.
pub const CHANNEL_DOCTYPE: &str = "Raven Channel";
/// Doctype of user documents; `list_update` for it invalidates the directory.
pub const USER_DOCTYPE: &str = "Raven User";

/// Snapshot of the users currently typing in a channel. Never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub channel: ChannelId,
    pub users: Vec<UserId>,
}

/// Server-reported unread count for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounterEntry {
    pub name: ChannelId,
    pub unread_count: u32,
    #[serde(default)]
    pub is_direct_message: bool,
}

/// Channel visibility as stored on the channel document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    Public,
    Private,
    Open,
}

/// Read-only snapshot of the channel attributes the unread partition needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub name: ChannelId,
    #[serde(default)]
    pub channel_name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub is_direct_message: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// Membership record of the current user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    /// The other participant of a DM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_user_id: Option<UserId>,
}

impl ChannelMetadata {
    pub fn is_member(&self) -> bool {
        self.member_id.is_some()
    }
}

/// Denormalized projection of a user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDirectoryEntry {
    pub name: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn channel_metadata_reads_document_fields() {
        let raw = r#"{"name":"general","type":"Public","member_id":"m-1"}"#;
        let c: ChannelMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(c.channel_type, ChannelType::Public);
        assert!(c.is_member());
        assert!(!c.is_archived);
    }

    #[test]
    fn directory_entry_defaults_to_enabled() {
        let u: UserDirectoryEntry = serde_json::from_str(r#"{"name":"bob@example.com"}"#).unwrap();
        assert!(u.enabled);
        assert_eq!(u.name.as_str(), "bob@example.com");
    }
}
