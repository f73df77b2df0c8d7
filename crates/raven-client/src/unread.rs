//! Unread counters and manual unread overrides.
//!
//! Two independent signals live here:
//! - the counter map, a cached copy of the server's unread counts that local
//!   optimistic edits may temporarily get ahead of;
//! - the override set, channels the user explicitly marked unread, persisted in
//!   the `unread-overrides` keyspace.
//!
//! An overridden channel always reads as unread (`effective` count >= 1) until
//! the user opens it or a server snapshot fetched after the mark was acknowledged
//! reports the channel as read.
//!
//! Locks are std `RwLock`s and are never held across an `.await`, so optimistic
//! edits land synchronously with the user action that triggers them. Durable
//! writes of the override set go through `persist_override`, which is serialized
//! and always writes the current in-memory state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use raven_core::error::Result;
use raven_core::model::UnreadCounterEntry;
use raven_core::ChannelId;

use crate::kv::{KeyValueStore, UNREAD_OVERRIDES};
use crate::remote::RemoteService;

/// Count written by "mark as unread" until the server reports the real one.
pub const MARKED_UNREAD_SENTINEL: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverrideState {
    /// Marked locally, `mark_channel_as_unread` not acknowledged yet.
    Pending { mark: u64 },
    /// Acknowledged by the server at logical time `at`.
    Confirmed { at: u64 },
}

/// A channel's local state before an optimistic "mark as unread".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorState {
    pub channel: ChannelId,
    pub entry: Option<UnreadCounterEntry>,
    pub overridden: bool,
    prior_override: Option<OverrideState>,
    applied: UnreadCounterEntry,
    mark: u64,
}

pub struct UnreadStore {
    counters: RwLock<HashMap<ChannelId, UnreadCounterEntry>>,
    overrides: RwLock<BTreeMap<ChannelId, OverrideState>>,
    // logical clock ordering marks, confirmations and snapshot fetches
    clock: AtomicU64,
    persist: tokio::sync::Mutex<()>,
    kv: Arc<dyn KeyValueStore>,
}

impl UnreadStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            overrides: RwLock::new(BTreeMap::new()),
            clock: AtomicU64::new(0),
            persist: tokio::sync::Mutex::new(()),
            kv,
        }
    }

    /// Restore persisted overrides. An unreadable cache starts empty.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let store = Self::new(kv);
        match store.kv.get_all(UNREAD_OVERRIDES).await {
            Ok(entries) => {
                let mut overrides = store.overrides.write().unwrap_or_else(PoisonError::into_inner);
                // only acknowledged marks are ever written
                overrides.extend(
                    entries
                        .into_iter()
                        .map(|(k, _)| (ChannelId::new(k), OverrideState::Confirmed { at: 0 })),
                );
                tracing::debug!(count = overrides.len(), "unread overrides restored");
            }
            Err(e) => tracing::warn!(error = %e, "unread overrides unreadable; starting empty"),
        }
        store
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the whole counter map with an authoritative snapshot.
    /// The override set is left alone.
    pub fn apply_server_snapshot(&self, entries: Vec<UnreadCounterEntry>) {
        let map = entries.into_iter().map(|e| (e.name.clone(), e)).collect();
        *self.counters.write().unwrap_or_else(PoisonError::into_inner) = map;
    }

    /// The user opened `channel`: count -> 0 and override cleared.
    /// Returns whether an override was removed. Idempotent.
    pub fn optimistic_zero(&self, channel: &ChannelId) -> bool {
        {
            let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = counters.get_mut(channel) {
                entry.unread_count = 0;
            }
        }
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel)
            .is_some()
    }

    /// Force `channel` unread locally. Returns what to restore if the server
    /// rejects the mark.
    pub fn optimistic_mark_unread(&self, channel: &ChannelId) -> PriorState {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        let entry = counters.get(channel).cloned();
        let applied = UnreadCounterEntry {
            name: channel.clone(),
            unread_count: entry
                .as_ref()
                .map_or(MARKED_UNREAD_SENTINEL, |e| e.unread_count.max(MARKED_UNREAD_SENTINEL)),
            is_direct_message: entry.as_ref().is_some_and(|e| e.is_direct_message),
        };
        counters.insert(channel.clone(), applied.clone());
        drop(counters);

        let mark = self.tick();
        let prior_override = self
            .overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.clone(), OverrideState::Pending { mark });

        PriorState {
            channel: channel.clone(),
            entry,
            overridden: prior_override.is_some(),
            prior_override,
            applied,
            mark,
        }
    }

    /// Undo an optimistic mark. A counter that a server snapshot has replaced
    /// in the meantime is newer than both states and is kept, and so is an
    /// override the user cleared or re-marked since.
    pub fn rollback(&self, prior: PriorState) {
        {
            let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
            if counters.get(&prior.channel) == Some(&prior.applied) {
                match prior.entry {
                    Some(entry) => counters.insert(prior.channel.clone(), entry),
                    None => counters.remove(&prior.channel),
                };
            }
        }

        let mut overrides = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        if overrides.get(&prior.channel) == Some(&OverrideState::Pending { mark: prior.mark }) {
            match prior.prior_override {
                Some(state) => overrides.insert(prior.channel, state),
                None => overrides.remove(&prior.channel),
            };
        }
    }

    /// Promote the pending override of `mark` to confirmed. False when the
    /// override was cleared or replaced while the RPC was in flight.
    fn confirm(&self, channel: &ChannelId, mark: u64) -> bool {
        let mut overrides = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        match overrides.get_mut(channel) {
            Some(state) if *state == (OverrideState::Pending { mark }) => {
                *state = OverrideState::Confirmed { at: self.tick() };
                true
            }
            _ => false,
        }
    }

    fn is_confirmed(&self, channel: &ChannelId) -> bool {
        matches!(
            self.overrides
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(channel),
            Some(OverrideState::Confirmed { .. })
        )
    }

    /// Write the current in-memory override state of `channel` to the durable
    /// store. Serialized, so the last write always reflects the latest state.
    async fn persist_override(&self, channel: &ChannelId) -> Result<()> {
        let _guard = self.persist.lock().await;
        if self.is_confirmed(channel) {
            self.kv.put(UNREAD_OVERRIDES, channel.as_str(), Value::Bool(true)).await
        } else {
            self.kv.delete(UNREAD_OVERRIDES, channel.as_str()).await
        }
    }

    /// Drop confirmed overrides that `entries` reports as read. Only overrides
    /// confirmed before `fetched_from` count as contradicted by the snapshot.
    fn settle_overrides(&self, entries: &[UnreadCounterEntry], fetched_from: u64) -> Vec<ChannelId> {
        let mut overrides = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        let mut cleared = Vec::new();
        for entry in entries.iter().filter(|e| e.unread_count == 0) {
            let contradicted = matches!(
                overrides.get(&entry.name),
                Some(OverrideState::Confirmed { at }) if *at < fetched_from
            );
            if contradicted {
                overrides.remove(&entry.name);
                cleared.push(entry.name.clone());
            }
        }
        cleared
    }

    /// `optimistic_zero` plus removal of the persisted override.
    pub async fn open_channel(&self, channel: &ChannelId) -> Result<()> {
        if self.optimistic_zero(channel) {
            self.persist_override(channel).await?;
        }
        Ok(())
    }

    /// Mark `channel` unread: optimistic local state first, then the RPC.
    /// If the RPC fails the local state is rolled back and the error returned.
    pub async fn mark_unread(&self, remote: &dyn RemoteService, channel: &ChannelId) -> Result<()> {
        let prior = self.optimistic_mark_unread(channel);
        let mark = prior.mark;
        if let Err(e) = remote.mark_channel_as_unread(channel).await {
            tracing::warn!(%channel, error = %e, "mark as unread rejected; rolling back");
            self.rollback(prior);
            return Err(e);
        }
        if !self.confirm(channel, mark) {
            tracing::debug!(%channel, "override cleared while the mark was in flight");
            return Ok(());
        }
        if let Err(e) = self.persist_override(channel).await {
            // the server already holds the unread state; only the local icon is at stake
            tracing::warn!(%channel, error = %e, "failed to persist unread override");
        }
        Ok(())
    }

    /// Fetch and apply a fresh server snapshot. Confirmed overrides the snapshot
    /// reports as read are cleared.
    pub async fn refresh(&self, remote: &dyn RemoteService) -> Result<()> {
        let fetched_from = self.tick();
        let entries = remote.unread_counts().await?;
        tracing::debug!(channels = entries.len(), "unread counts refreshed");

        let cleared = self.settle_overrides(&entries, fetched_from);
        self.apply_server_snapshot(entries);
        for channel in &cleared {
            tracing::debug!(%channel, "unread override cleared by server count");
            if let Err(e) = self.persist_override(channel).await {
                tracing::warn!(%channel, error = %e, "failed to drop persisted unread override");
            }
        }
        Ok(())
    }

    /// Cached counts with overrides folded in.
    pub fn effective_counts(&self) -> HashMap<ChannelId, u32> {
        let mut counts: HashMap<ChannelId, u32> = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, e)| (k.clone(), e.unread_count))
            .collect();
        for channel in self.overrides.read().unwrap_or_else(PoisonError::into_inner).keys() {
            let c = counts.entry(channel.clone()).or_insert(0);
            *c = (*c).max(MARKED_UNREAD_SENTINEL);
        }
        counts
    }

    pub fn unread_count(&self, channel: &ChannelId) -> u32 {
        let cached = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .map_or(0, |e| e.unread_count);
        if self.is_overridden(channel) {
            cached.max(MARKED_UNREAD_SENTINEL)
        } else {
            cached
        }
    }

    /// Raw cached entry, without overrides.
    pub fn entry(&self, channel: &ChannelId) -> Option<UnreadCounterEntry> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }

    pub fn is_overridden(&self, channel: &ChannelId) -> bool {
        self.overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(channel)
    }

    pub fn overrides(&self) -> BTreeSet<ChannelId> {
        self.overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use async_trait::async_trait;
    use raven_core::error::RavenError;
    use raven_core::model::UserDirectoryEntry;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn entry(name: &str, n: u32) -> UnreadCounterEntry {
        UnreadCounterEntry {
            name: ChannelId::from(name),
            unread_count: n,
            is_direct_message: false,
        }
    }

    fn store() -> UnreadStore {
        UnreadStore::new(Arc::new(MemoryStore::new()))
    }

    /// Server double: `mark_channel_as_unread` bumps the count to at least 1.
    /// With `gate` set, the mark waits until `release` is notified.
    #[derive(Default)]
    struct Server {
        counts: Mutex<HashMap<ChannelId, u32>>,
        gate: bool,
        entered: Notify,
        release: Notify,
    }

    impl Server {
        fn set(&self, channel: &str, n: u32) {
            self.counts.lock().unwrap().insert(ChannelId::from(channel), n);
        }
    }

    #[async_trait]
    impl RemoteService for Server {
        async fn unread_counts(&self) -> Result<Vec<UnreadCounterEntry>> {
            Ok(self
                .counts
                .lock()
                .unwrap()
                .iter()
                .map(|(c, n)| entry(c.as_str(), *n))
                .collect())
        }

        async fn mark_channel_as_unread(&self, channel: &ChannelId) -> Result<()> {
            if self.gate {
                self.entered.notify_one();
                self.release.notified().await;
            }
            let mut counts = self.counts.lock().unwrap();
            let c = counts.entry(channel.clone()).or_insert(0);
            *c = (*c).max(1);
            Ok(())
        }

        async fn user_directory(&self) -> Result<Vec<UserDirectoryEntry>> {
            Err(RavenError::Rpc("not used".into()))
        }
    }

    #[test]
    fn snapshot_replaces_whole_map() {
        let s = store();
        s.apply_server_snapshot(vec![entry("a", 2), entry("b", 1)]);
        s.apply_server_snapshot(vec![entry("b", 4)]);
        assert!(s.entry(&ChannelId::from("a")).is_none());
        assert_eq!(s.unread_count(&ChannelId::from("b")), 4);
    }

    #[test]
    fn optimistic_zero_is_idempotent() {
        let s = store();
        s.apply_server_snapshot(vec![entry("a", 3)]);
        let c = ChannelId::from("a");
        s.optimistic_zero(&c);
        let once = s.effective_counts();
        assert!(!s.optimistic_zero(&c));
        assert_eq!(s.effective_counts(), once);
        assert_eq!(s.unread_count(&c), 0);
    }

    #[test]
    fn pending_override_wins_over_zero_snapshots() {
        let s = store();
        let c = ChannelId::from("a");
        s.optimistic_mark_unread(&c);
        s.apply_server_snapshot(vec![entry("a", 0)]);
        s.apply_server_snapshot(vec![entry("a", 0)]);
        assert!(s.is_overridden(&c));
        assert_eq!(s.unread_count(&c), 1);
        assert_eq!(s.effective_counts().get(&c), Some(&1));

        assert!(s.optimistic_zero(&c));
        assert_eq!(s.unread_count(&c), 0);
    }

    #[test]
    fn mark_keeps_higher_counts() {
        let s = store();
        s.apply_server_snapshot(vec![entry("a", 7)]);
        s.optimistic_mark_unread(&ChannelId::from("a"));
        assert_eq!(s.unread_count(&ChannelId::from("a")), 7);
    }

    #[test]
    fn rollback_restores_prior_state() {
        let s = store();
        s.apply_server_snapshot(vec![entry("a", 0)]);
        let c = ChannelId::from("a");
        let prior = s.optimistic_mark_unread(&c);
        assert_eq!(prior.entry, Some(entry("a", 0)));
        assert!(!prior.overridden);

        s.rollback(prior);
        assert_eq!(s.entry(&c), Some(entry("a", 0)));
        assert!(!s.is_overridden(&c));
    }

    #[test]
    fn rollback_keeps_newer_snapshot_and_existing_override() {
        let s = store();
        let c = ChannelId::from("a");
        s.optimistic_mark_unread(&c);
        let prior = s.optimistic_mark_unread(&c);
        assert!(prior.overridden);

        s.apply_server_snapshot(vec![entry("a", 5)]);
        s.rollback(prior);
        assert_eq!(s.entry(&c), Some(entry("a", 5)));
        assert!(s.is_overridden(&c));
    }

    #[test]
    fn rollback_after_open_does_not_restore_the_override() {
        let s = store();
        let c = ChannelId::from("a");
        let prior = s.optimistic_mark_unread(&c);
        s.optimistic_zero(&c);
        s.rollback(prior);
        assert!(!s.is_overridden(&c));
    }

    #[test]
    fn snapshot_fetched_before_confirmation_keeps_override() {
        let s = store();
        let c = ChannelId::from("a");
        let prior = s.optimistic_mark_unread(&c);
        let stale_fetch = s.tick();
        assert!(s.confirm(&c, prior.mark));

        assert!(s.settle_overrides(&[entry("a", 0)], stale_fetch).is_empty());
        assert!(s.is_overridden(&c));

        let fresh_fetch = s.tick();
        assert_eq!(s.settle_overrides(&[entry("a", 0)], fresh_fetch), vec![c.clone()]);
        assert!(!s.is_overridden(&c));
    }

    #[tokio::test]
    async fn confirmed_override_cleared_once_server_reports_read() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let s = UnreadStore::new(kv.clone());
        let server = Server::default();
        server.set("general", 0);
        let c = ChannelId::from("general");

        s.mark_unread(&server, &c).await.unwrap();
        assert!(kv.get(UNREAD_OVERRIDES, "general").await.unwrap().is_some());

        // server applied the mark
        s.refresh(&server).await.unwrap();
        assert!(s.is_overridden(&c));
        assert_eq!(s.unread_count(&c), 1);

        // read on another device
        server.set("general", 0);
        s.refresh(&server).await.unwrap();
        assert!(!s.is_overridden(&c));
        assert_eq!(s.unread_count(&c), 0);
        assert!(kv.get(UNREAD_OVERRIDES, "general").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn opening_during_inflight_mark_is_not_undone() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let s = UnreadStore::new(kv.clone());
        let server = Server {
            gate: true,
            ..Server::default()
        };
        let c = ChannelId::from("general");

        let (marked, opened) = tokio::join!(s.mark_unread(&server, &c), async {
            server.entered.notified().await;
            let opened = s.open_channel(&c).await;
            server.release.notify_one();
            opened
        });
        marked.unwrap();
        opened.unwrap();

        assert!(!s.is_overridden(&c));
        assert!(kv.get(UNREAD_OVERRIDES, "general").await.unwrap().is_none());
        let restarted = UnreadStore::load(kv).await;
        assert!(!restarted.is_overridden(&c));
    }

    #[tokio::test]
    async fn overrides_persist_across_load() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        kv.put(UNREAD_OVERRIDES, "general", Value::Bool(true)).await.unwrap();

        let s = UnreadStore::load(kv.clone()).await;
        assert!(s.is_overridden(&ChannelId::from("general")));

        s.open_channel(&ChannelId::from("general")).await.unwrap();
        assert!(kv.get_all(UNREAD_OVERRIDES).await.unwrap().is_empty());
    }
}
