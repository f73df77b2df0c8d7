//! User directory cache.
//!
//! Read-mostly and eventually consistent: the server is the only writer and every
//! refresh is a full overwrite, so there is no per-entry versioning. Reads are
//! served from memory, which mirrors the durable `user-directory` keyspace.
//! Entries are never deleted; disabled users stay with `enabled = false`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use raven_core::error::{RavenError, Result};
use raven_core::model::UserDirectoryEntry;
use raven_core::UserId;

use crate::kv::{KeyValueStore, USER_DIRECTORY};
use crate::remote::RemoteService;

pub struct UserDirectory {
    entries: RwLock<HashMap<UserId, UserDirectoryEntry>>,
    ready: AtomicBool,
    kv: Arc<dyn KeyValueStore>,
}

impl UserDirectory {
    /// Load the durable snapshot. Ready immediately if it holds any entry.
    /// An unreadable cache is logged and treated as empty.
    pub async fn init(kv: Arc<dyn KeyValueStore>) -> Self {
        let mut entries = HashMap::new();
        match kv.get_all(USER_DIRECTORY).await {
            Ok(raw) => {
                for (key, value) in raw {
                    match serde_json::from_value::<UserDirectoryEntry>(value) {
                        Ok(entry) => {
                            entries.insert(entry.name.clone(), entry);
                        }
                        Err(e) => tracing::warn!(user = %key, error = %e, "skipping corrupt directory entry"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "user directory cache unreadable; starting empty"),
        }

        tracing::debug!(users = entries.len(), "user directory loaded from cache");
        Self {
            ready: AtomicBool::new(!entries.is_empty()),
            entries: RwLock::new(entries),
            kv,
        }
    }

    /// `init`, then fetch from the server right away when nothing was cached.
    /// With a warm cache the caller refreshes in the background.
    pub async fn init_and_refresh(kv: Arc<dyn KeyValueStore>, remote: &dyn RemoteService) -> Result<Self> {
        let dir = Self::init(kv).await;
        if !dir.is_ready() {
            dir.refresh(remote).await?;
        }
        Ok(dir)
    }

    /// Upsert `entries` in one step and persist them. Keys absent from the batch
    /// are kept, so a full refresh must pass the complete directory.
    pub async fn bulk_replace(&self, entries: Vec<UserDirectoryEntry>) -> Result<()> {
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            let value = serde_json::to_value(entry)
                .map_err(|e| RavenError::Storage(format!("encode user {}: {e}", entry.name)))?;
            rows.push((entry.name.as_str().to_string(), value));
        }

        {
            let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            map.extend(entries.into_iter().map(|e| (e.name.clone(), e)));
        }

        self.kv.bulk_put(USER_DIRECTORY, rows).await
    }

    /// Full re-fetch + `bulk_replace`. Marks the directory ready once the fetch
    /// succeeded, even if persisting the snapshot failed.
    pub async fn refresh(&self, remote: &dyn RemoteService) -> Result<()> {
        let users = remote.user_directory().await?;
        let count = users.len();
        let persisted = self.bulk_replace(users).await;
        self.ready.store(true, Ordering::Release);
        match persisted {
            Ok(()) => tracing::debug!(users = count, "user directory refreshed"),
            Err(e) => tracing::warn!(error = %e, "user directory refreshed but not persisted"),
        }
        Ok(())
    }

    pub fn get(&self, user: &UserId) -> Option<UserDirectoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
    }

    /// Full name, falling back to the user id.
    pub fn display_name(&self, user: &UserId) -> String {
        self.get(user)
            .map(|u| u.full_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user.to_string())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enabled users sorted by full name.
    pub fn enabled_users(&self) -> Vec<UserDirectoryEntry> {
        let mut users: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|u| u.enabled)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.name.cmp(&b.name)));
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;

    fn user(id: &str, full_name: &str, enabled: bool) -> UserDirectoryEntry {
        UserDirectoryEntry {
            name: UserId::from(id),
            full_name: full_name.to_string(),
            first_name: String::new(),
            user_image: None,
            enabled,
            availability_status: None,
            custom_status: None,
        }
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _: &str, _: &str) -> Result<Option<Value>> {
            Err(RavenError::Storage("disk gone".into()))
        }
        async fn get_all(&self, _: &str) -> Result<Vec<(String, Value)>> {
            Err(RavenError::Storage("disk gone".into()))
        }
        async fn bulk_put(&self, _: &str, _: Vec<(String, Value)>) -> Result<()> {
            Err(RavenError::Storage("disk gone".into()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<()> {
            Err(RavenError::Storage("disk gone".into()))
        }
    }

    #[tokio::test]
    async fn empty_cache_is_not_ready() {
        let dir = UserDirectory::init(Arc::new(MemoryStore::new())).await;
        assert!(!dir.is_ready());
        assert!(dir.is_empty());
    }

    #[tokio::test]
    async fn warm_cache_is_ready_and_survives_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let dir = UserDirectory::init(kv.clone()).await;
        dir.bulk_replace(vec![user("alice@example.com", "Alice", true)])
            .await
            .unwrap();

        let reloaded = UserDirectory::init(kv).await;
        assert!(reloaded.is_ready());
        assert_eq!(reloaded.display_name(&UserId::from("alice@example.com")), "Alice");
        assert_eq!(reloaded.display_name(&UserId::from("ghost")), "ghost");
    }

    #[tokio::test]
    async fn unreadable_cache_starts_empty() {
        let dir = UserDirectory::init(Arc::new(FailingStore)).await;
        assert!(!dir.is_ready());
        // in-memory upsert still happens even though the write fails
        assert!(dir.bulk_replace(vec![user("a", "A", true)]).await.is_err());
        assert_eq!(dir.len(), 1);
    }

    #[tokio::test]
    async fn disabled_users_stay_resolvable() {
        let dir = UserDirectory::init(Arc::new(MemoryStore::new())).await;
        dir.bulk_replace(vec![user("b", "Bob", false), user("a", "Ann", true)])
            .await
            .unwrap();
        assert_eq!(dir.len(), 2);
        assert!(!dir.get(&UserId::from("b")).unwrap().enabled);
        let enabled: Vec<_> = dir.enabled_users().into_iter().map(|u| u.full_name).collect();
        assert_eq!(enabled, vec!["Ann"]);
    }

    struct Directory(Vec<UserDirectoryEntry>);

    #[async_trait]
    impl RemoteService for Directory {
        async fn unread_counts(&self) -> Result<Vec<raven_core::model::UnreadCounterEntry>> {
            Ok(Vec::new())
        }
        async fn mark_channel_as_unread(&self, _: &raven_core::ChannelId) -> Result<()> {
            Ok(())
        }
        async fn user_directory(&self) -> Result<Vec<UserDirectoryEntry>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn cold_start_fetches_immediately() {
        let remote = Directory(vec![user("a", "Ann", true)]);
        let dir = UserDirectory::init_and_refresh(Arc::new(MemoryStore::new()), &remote)
            .await
            .unwrap();
        assert!(dir.is_ready());
        assert_eq!(dir.display_name(&UserId::from("a")), "Ann");
    }
}
