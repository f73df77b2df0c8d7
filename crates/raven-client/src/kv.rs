//! Local durable key-value cache.
//!
//! Values are JSON documents grouped in keyspaces. Two implementations:
//! `MemoryStore` (tests, ephemeral sessions) and `JsonFileStore` (one JSON file
//! per keyspace, replaced atomically on every write).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use raven_core::error::{RavenError, Result};

/// Keyspace of the manual unread overrides.
pub const UNREAD_OVERRIDES: &str = "unread-overrides";
/// Keyspace of the user directory snapshot.
pub const USER_DIRECTORY: &str = "user-directory";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keyspace: &str, key: &str) -> Result<Option<Value>>;

    async fn get_all(&self, keyspace: &str) -> Result<Vec<(String, Value)>>;

    /// Upsert every entry in one write.
    async fn bulk_put(&self, keyspace: &str, entries: Vec<(String, Value)>) -> Result<()>;

    async fn put(&self, keyspace: &str, key: &str, value: Value) -> Result<()> {
        self.bulk_put(keyspace, vec![(key.to_string(), value)]).await
    }

    async fn delete(&self, keyspace: &str, key: &str) -> Result<()>;
}

type Keyspace = BTreeMap<String, Value>;

#[derive(Default)]
pub struct MemoryStore {
    spaces: Mutex<HashMap<String, Keyspace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut HashMap<String, Keyspace>) -> T) -> T {
        let mut guard = self.spaces.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keyspace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.with(|s| s.get(keyspace).and_then(|ks| ks.get(key).cloned())))
    }

    async fn get_all(&self, keyspace: &str) -> Result<Vec<(String, Value)>> {
        Ok(self.with(|s| {
            s.get(keyspace)
                .map(|ks| ks.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default()
        }))
    }

    async fn bulk_put(&self, keyspace: &str, entries: Vec<(String, Value)>) -> Result<()> {
        self.with(|s| s.entry(keyspace.to_string()).or_default().extend(entries));
        Ok(())
    }

    async fn delete(&self, keyspace: &str, key: &str) -> Result<()> {
        self.with(|s| {
            if let Some(ks) = s.get_mut(keyspace) {
                ks.remove(key);
            }
        });
        Ok(())
    }
}

/// Keyspaces stored as `<dir>/<keyspace>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
    // serializes read-modify-write cycles
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RavenError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, keyspace: &str) -> Result<PathBuf> {
        let valid = !keyspace.is_empty()
            && keyspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(RavenError::Storage(format!("invalid keyspace name: {keyspace:?}")));
        }
        Ok(self.dir.join(format!("{keyspace}.json")))
    }

    async fn read_space(&self, keyspace: &str) -> Result<Keyspace> {
        let path = self.path_of(keyspace)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Keyspace::new()),
            Err(e) => return Err(RavenError::Storage(format!("read {}: {e}", path.display()))),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| RavenError::Storage(format!("corrupt {}: {e}", path.display())))
    }

    async fn write_space(&self, keyspace: &str, space: &Keyspace) -> Result<()> {
        let path = self.path_of(keyspace)?;
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec(space)
            .map_err(|e| RavenError::Storage(format!("encode {keyspace}: {e}")))?;
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| RavenError::Storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| RavenError::Storage(format!("rename {}: {e}", path.display())))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keyspace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.read_space(keyspace).await?.remove(key))
    }

    async fn get_all(&self, keyspace: &str) -> Result<Vec<(String, Value)>> {
        Ok(self.read_space(keyspace).await?.into_iter().collect())
    }

    async fn bulk_put(&self, keyspace: &str, entries: Vec<(String, Value)>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut space = self.read_space(keyspace).await?;
        space.extend(entries);
        self.write_space(keyspace, &space).await
    }

    async fn delete(&self, keyspace: &str, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut space = self.read_space(keyspace).await?;
        if space.remove(key).is_some() {
            self.write_space(keyspace, &space).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_upserts_and_deletes() {
        let kv = MemoryStore::new();
        kv.bulk_put("users", vec![("a".into(), json!(1)), ("b".into(), json!(2))])
            .await
            .unwrap();
        kv.put("users", "a", json!(3)).await.unwrap();
        kv.delete("users", "b").await.unwrap();
        kv.delete("nothing", "b").await.unwrap();

        assert_eq!(kv.get("users", "a").await.unwrap(), Some(json!(3)));
        assert_eq!(kv.get_all("users").await.unwrap(), vec![("a".to_string(), json!(3))]);
        assert!(kv.get_all("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let kv = JsonFileStore::open(dir.path()).await.unwrap();
            kv.put(UNREAD_OVERRIDES, "general", json!(true)).await.unwrap();
            kv.put(UNREAD_OVERRIDES, "random", json!(true)).await.unwrap();
            kv.delete(UNREAD_OVERRIDES, "random").await.unwrap();
        }
        let kv = JsonFileStore::open(dir.path()).await.unwrap();
        let all = kv.get_all(UNREAD_OVERRIDES).await.unwrap();
        assert_eq!(all, vec![("general".to_string(), json!(true))]);
        assert!(kv.get(USER_DIRECTORY, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user-directory.json"), b"{not json").unwrap();
        let kv = JsonFileStore::open(dir.path()).await.unwrap();
        let err = kv.get_all(USER_DIRECTORY).await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "STORAGE");
    }

    #[tokio::test]
    async fn keyspace_names_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let kv = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(kv.get_all("../etc").await.is_err());
    }
}
