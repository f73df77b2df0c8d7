//! Client sync driver: routes server pushes to the unread store, the user
//! directory and the typing indicators, and exposes the reconciled partition.

use std::sync::{Arc, PoisonError, RwLock};

use raven_core::error::Result;
use raven_core::model::{ChannelMetadata, USER_DOCTYPE};
use raven_core::protocol::ServerEvent;
use raven_core::{ChannelId, UserId};

use crate::directory::UserDirectory;
use crate::kv::KeyValueStore;
use crate::reconcile::{reconcile, UnreadPartition};
use crate::remote::RemoteService;
use crate::typing::TypingIndicators;
use crate::unread::UnreadStore;

pub struct SyncClient {
    me: UserId,
    remote: Arc<dyn RemoteService>,
    unread: UnreadStore,
    directory: UserDirectory,
    typing: TypingIndicators,
    viewing: RwLock<Option<ChannelId>>,
}

impl SyncClient {
    /// Restore caches and fetch what the UI cannot render without.
    ///
    /// Never fails: a cold directory is fetched right away and unread counts are
    /// pulled, but errors only leave the cached state in place. A warm directory
    /// is not re-fetched here; the gateway's `authed` event (sent on every
    /// connect) triggers `resync`, which refreshes it in the background of an
    /// already rendered UI. Callers without a realtime connection call `resync`.
    pub async fn start(me: UserId, kv: Arc<dyn KeyValueStore>, remote: Arc<dyn RemoteService>) -> Self {
        let unread = UnreadStore::load(kv.clone()).await;
        let directory = UserDirectory::init(kv).await;
        if !directory.is_ready() {
            if let Err(e) = directory.refresh(remote.as_ref()).await {
                tracing::warn!(error = %e, "user directory fetch failed; starting without one");
            }
        }
        if let Err(e) = unread.refresh(remote.as_ref()).await {
            tracing::warn!(error = %e, "unread counts fetch failed; using cached state");
        }
        tracing::info!(user = %me, directory = directory.len(), "sync client started");

        Self {
            me,
            remote,
            unread,
            directory,
            typing: TypingIndicators::new(),
            viewing: RwLock::new(None),
        }
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    pub fn unread(&self) -> &UnreadStore {
        &self.unread
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn typing(&self) -> &TypingIndicators {
        &self.typing
    }

    pub fn viewing(&self) -> Option<ChannelId> {
        self.viewing.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The user opened `channel`.
    pub async fn open_channel(&self, channel: &ChannelId) -> Result<()> {
        *self.viewing.write().unwrap_or_else(PoisonError::into_inner) = Some(channel.clone());
        self.unread.open_channel(channel).await
    }

    pub fn close_channel(&self) {
        *self.viewing.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Explicit "mark as unread". Errors are for the UI to show.
    pub async fn mark_unread(&self, channel: &ChannelId) -> Result<()> {
        if self.viewing().as_ref() == Some(channel) {
            self.close_channel();
        }
        self.unread.mark_unread(self.remote.as_ref(), channel).await
    }

    /// Re-fetch unread counts and the user directory. Both are attempted; the
    /// first error is returned.
    pub async fn resync(&self) -> Result<()> {
        let unread = self.unread.refresh(self.remote.as_ref()).await;
        let directory = self.directory.refresh(self.remote.as_ref()).await;
        unread.and(directory)
    }

    pub async fn handle(&self, event: ServerEvent) -> Result<()> {
        match event {
            ServerEvent::Typers(snapshot) => {
                self.typing.apply(snapshot);
                Ok(())
            }
            ServerEvent::UnreadCountUpdated(update) => {
                if update.sent_by.as_ref() == Some(&self.me) {
                    return Ok(());
                }
                if self.viewing().as_ref() == Some(&update.channel_id) {
                    // the message is on screen already
                    return self.unread.open_channel(&update.channel_id).await;
                }
                self.unread.refresh(self.remote.as_ref()).await
            }
            ServerEvent::ListUpdate(doc) if doc.doctype == USER_DOCTYPE => {
                self.directory.refresh(self.remote.as_ref()).await
            }
            ServerEvent::ListUpdate(_) => Ok(()),
            ServerEvent::Authed { session, .. } => {
                tracing::debug!(%session, "realtime session authenticated; resyncing");
                self.typing.clear();
                self.resync().await
            }
            ServerEvent::Error { code, msg } => {
                tracing::warn!(%code, %msg, "realtime error from gateway");
                Ok(())
            }
        }
    }

    /// Unread partition over the given channel lists.
    pub fn partition(&self, channels: &[ChannelMetadata], dm_channels: &[ChannelMetadata]) -> UnreadPartition {
        reconcile(channels, dm_channels, &self.unread.effective_counts())
    }
}
