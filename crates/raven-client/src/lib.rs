//! Raven client sync layer.
//!
//! Keeps the client's unread state, manual unread overrides, user directory and
//! typing indicators consistent with the server:
//! - `kv`: local durable key-value cache (`unread-overrides`, `user-directory`)
//! - `remote`: the document service RPCs this layer consumes
//! - `unread` + `reconcile`: counters, overrides, and the pure partition
//! - `directory`: bulk-replaced user directory cache
//! - `sync`: routes server pushes to the components above

pub mod directory;
pub mod kv;
pub mod reconcile;
pub mod remote;
pub mod sync;
pub mod typing;
pub mod unread;

pub use directory::UserDirectory;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use reconcile::{reconcile, ChannelWithUnreadCount, UnreadPartition};
pub use remote::RemoteService;
pub use sync::SyncClient;
pub use typing::TypingIndicators;
pub use unread::UnreadStore;
