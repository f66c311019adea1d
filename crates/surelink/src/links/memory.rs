//! In-memory link store for development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use surelink_common::{Result, ShortLink};

use super::{InsertOutcome, LinkStore};

#[derive(Default)]
pub struct MemoryLinkStore {
    links: RwLock<HashMap<String, ShortLink>>,
    /// Number of `find_by_code` calls, to observe cache effectiveness
    lookups: AtomicU64,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    /// Overwrite a destination directly, bypassing any cache
    #[cfg(test)]
    pub async fn update_destination(&self, code: &str, destination: &str) {
        if let Some(link) = self.links.write().await.get_mut(code) {
            link.destination = destination.to_string();
        }
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.links.read().await.get(code).cloned())
    }

    async fn insert(&self, link: &ShortLink) -> Result<InsertOutcome> {
        let mut links = self.links.write().await;
        if links.contains_key(&link.code) {
            return Ok(InsertOutcome::Conflict);
        }
        links.insert(link.code.clone(), link.clone());
        Ok(InsertOutcome::Inserted)
    }
}
