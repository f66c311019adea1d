//! Bounded FIFO of pre-rendered, not-yet-issued challenges.
//!
//! The queue lives in the shared cache store as a single list key, so every
//! node's refill job and request handlers see the same pool. Capacity is
//! enforced by the store's atomic bounded push.

use std::sync::Arc;

use surelink_common::constants::cache_keys;
use surelink_common::{CaptchaChallenge, QueueEntry, Result, SurelinkError};

use crate::store::CacheStore;

pub struct CaptchaQueue {
    store: Arc<dyn CacheStore>,
    key: String,
    capacity: usize,
}

impl CaptchaQueue {
    pub fn new(store: Arc<dyn CacheStore>, capacity: usize) -> Self {
        Self {
            store,
            key: cache_keys::CAPTCHA_QUEUE.to_string(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued challenges
    pub async fn len(&self) -> Result<usize> {
        self.store.list_len(&self.key).await
    }

    /// Append a challenge; fails with `QueueFull` at capacity
    pub async fn enqueue(&self, challenge: CaptchaChallenge) -> Result<()> {
        let raw = serde_json::to_string(&QueueEntry::new(challenge))?;
        if self
            .store
            .push_bounded(&self.key, &raw, self.capacity)
            .await?
        {
            Ok(())
        } else {
            Err(SurelinkError::QueueFull)
        }
    }

    /// Remove the oldest challenge; fails with `QueueEmpty` when drained
    pub async fn dequeue(&self) -> Result<CaptchaChallenge> {
        loop {
            let Some(raw) = self.store.pop_front(&self.key).await? else {
                return Err(SurelinkError::QueueEmpty);
            };

            match serde_json::from_str::<QueueEntry>(&raw) {
                Ok(entry) => return Ok(entry.challenge),
                Err(e) => {
                    // Unreadable entries are dropped, the next one is tried
                    tracing::warn!(error = %e, "Discarding malformed queue entry");
                }
            }
        }
    }
}
