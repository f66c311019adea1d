//! Shared cache store.
//!
//! All queue and cache state lives behind [`CacheStore`]. Implementations
//! only promise single-key atomicity; nothing here relies on multi-key
//! transactions.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use surelink_common::Result;

/// Key/value store with TTLs and a bounded FIFO list primitive
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value, `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomically read and remove a key
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Append to the list at `key` unless it already holds `capacity` items.
    ///
    /// Returns `false` when the list is full.
    async fn push_bounded(&self, key: &str, value: &str, capacity: usize) -> Result<bool>;

    /// Remove and return the oldest item of the list at `key`
    async fn pop_front(&self, key: &str) -> Result<Option<String>>;

    /// Current length of the list at `key`
    async fn list_len(&self, key: &str) -> Result<usize>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;
}

/// Typed helpers layered on top of the string API
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set_ex(key, &raw, ttl).await
}
