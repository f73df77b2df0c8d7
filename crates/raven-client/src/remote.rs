//! Remote document service, as far as the sync layer uses it.

use async_trait::async_trait;

use raven_core::error::Result;
use raven_core::model::{UnreadCounterEntry, UserDirectoryEntry};
use raven_core::ChannelId;

/// RPC surface of the document service consumed by the client sync layer.
/// Implementations map transport failures and server rejections to
/// `RavenError::Rpc`.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Unread counts of every channel and DM the user can see.
    async fn unread_counts(&self) -> Result<Vec<UnreadCounterEntry>>;

    async fn mark_channel_as_unread(&self, channel: &ChannelId) -> Result<()>;

    /// The complete user directory.
    async fn user_directory(&self) -> Result<Vec<UserDirectoryEntry>>;
}
