//! Process-local cache store.
//!
//! Same semantics as the Redis store (TTL expiry, bounded lists), for
//! development and tests. Expired entries are dropped on read and by a
//! periodic sweep on write, so keys that are never read again do not pile
//! up. Expiry follows the tokio clock so paused-time tests can advance past
//! a TTL.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use surelink_common::{Result, SurelinkError};

use super::CacheStore;

/// Minimum spacing between expiry sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, Entry>,
    lists: HashMap<String, VecDeque<String>>,
    last_sweep: Option<Instant>,
}

impl Inner {
    fn sweep_expired(&mut self, now: Instant) {
        if self
            .last_sweep
            .is_some_and(|last| now.duration_since(last) < SWEEP_INTERVAL)
        {
            return;
        }
        self.last_sweep = Some(now);
        self.values.retain(|_, entry| entry.is_live(now));
    }
}

/// In-memory [`CacheStore`]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// When false every call fails, simulating an unreachable store
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability
    #[cfg(test)]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SurelinkError::Store("memory store unavailable".to_string()))
        }
    }

    /// Number of live (unexpired) keys, lists excluded
    #[cfg(test)]
    pub async fn live_keys(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock().await;
        inner.values.values().filter(|e| e.is_live(now)).count()
    }

    /// Number of stored keys, expired or not
    #[cfg(test)]
    pub async fn resident_keys(&self) -> usize {
        self.inner.lock().await.values.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock().await;

        match inner.values.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        inner.sweep_expired(now);
        inner.values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        let removed_value = inner.values.remove(key).is_some_and(|e| e.is_live(now));
        let removed_list = inner.lists.remove(key).is_some();
        Ok(removed_value || removed_list)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        Ok(inner
            .values
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    async fn push_bounded(&self, key: &str, value: &str, capacity: usize) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let list = inner.lists.entry(key.to_string()).or_default();
        if list.len() >= capacity {
            return Ok(false);
        }
        list.push_back(value.to_string());
        Ok(true)
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        Ok(inner.lists.get_mut(key).and_then(VecDeque::pop_front))
    }

    async fn list_len(&self, key: &str) -> Result<usize> {
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_keys_are_swept_on_write() {
        let store = MemoryStore::new();
        for n in 0..1000 {
            store
                .set_ex(&format!("old-{n}"), "v", Duration::from_secs(300))
                .await
                .unwrap();
        }
        assert_eq!(store.resident_keys().await, 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        for n in 0..10 {
            store
                .set_ex(&format!("new-{n}"), "v", Duration::from_secs(300))
                .await
                .unwrap();
        }

        assert_eq!(store.live_keys().await, 10);
        assert_eq!(store.resident_keys().await, 10);
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bounded_list_fifo() {
        let store = MemoryStore::new();
        assert!(store.push_bounded("q", "a", 2).await.unwrap());
        assert!(store.push_bounded("q", "b", 2).await.unwrap());
        assert!(!store.push_bounded("q", "c", 2).await.unwrap());
        assert_eq!(store.list_len("q").await.unwrap(), 2);

        assert_eq!(store.pop_front("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.pop_front("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.pop_front("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_err!(store.get("k").await);
        assert_err!(store.ping().await);

        store.set_available(true);
        assert_ok!(store.ping().await);
    }
}
