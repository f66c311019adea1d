//! Service stat cache.
//!
//! Counters are bumped locally on the hot path and published to the shared
//! store on a short cycle. Readers accept staleness up to the stat TTL.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use surelink_common::constants::cache_keys;
use surelink_common::{Result, ServiceStat};

use crate::store::{self, CacheStore};

/// Local hit/miss tallies
#[derive(Default)]
pub struct ServiceStats {
    pub redirect_cache_hits: AtomicU64,
    pub redirect_cache_misses: AtomicU64,
    pub host_cache_hits: AtomicU64,
    pub host_cache_misses: AtomicU64,
    pub captchas_issued: AtomicU64,
    pub captchas_degraded: AtomicU64,
    pub captchas_validated: AtomicU64,
    pub captchas_rejected: AtomicU64,
    pub links_created: AtomicU64,
}

impl ServiceStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the local counters
    pub fn snapshot(&self, node_id: &str) -> ServiceStat {
        ServiceStat {
            node_id: node_id.to_string(),
            redirect_cache_hits: self.redirect_cache_hits.load(Ordering::Relaxed),
            redirect_cache_misses: self.redirect_cache_misses.load(Ordering::Relaxed),
            host_cache_hits: self.host_cache_hits.load(Ordering::Relaxed),
            host_cache_misses: self.host_cache_misses.load(Ordering::Relaxed),
            captchas_issued: self.captchas_issued.load(Ordering::Relaxed),
            captchas_degraded: self.captchas_degraded.load(Ordering::Relaxed),
            captchas_validated: self.captchas_validated.load(Ordering::Relaxed),
            captchas_rejected: self.captchas_rejected.load(Ordering::Relaxed),
            links_created: self.links_created.load(Ordering::Relaxed),
            captured_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Short-TTL view of [`ServiceStats`] in the shared store
pub struct StatCache {
    store: Arc<dyn CacheStore>,
    stats: Arc<ServiceStats>,
    node_id: String,
    ttl: Duration,
}

impl StatCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        stats: Arc<ServiceStats>,
        node_id: String,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            stats,
            node_id,
            ttl,
        }
    }

    /// Write the current local snapshot
    pub async fn publish(&self) -> Result<ServiceStat> {
        let snapshot = self.stats.snapshot(&self.node_id);
        store::set_json(
            self.store.as_ref(),
            &cache_keys::service_stat(&self.node_id),
            &snapshot,
            self.ttl,
        )
        .await?;
        Ok(snapshot)
    }

    /// Read the published snapshot, publishing a fresh one on miss
    pub async fn current(&self) -> Result<ServiceStat> {
        let key = cache_keys::service_stat(&self.node_id);
        match store::get_json::<ServiceStat>(self.store.as_ref(), &key).await? {
            Some(stat) => Ok(stat),
            None => self.publish().await,
        }
    }
}

/// Background worker that refreshes the stat cache
pub async fn stats_publisher_worker(
    cache: Arc<StatCache>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = cache.publish().await {
                    tracing::warn!(error = %e, "Failed to publish service stats");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Stats publisher shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn stat_cache(store: Arc<MemoryStore>, stats: Arc<ServiceStats>) -> StatCache {
        StatCache::new(store, stats, "node-test".into(), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_stale_within_ttl() {
        let store = Arc::new(MemoryStore::new());
        let stats = Arc::new(ServiceStats::default());
        let cache = stat_cache(store, stats.clone());

        ServiceStats::incr(&stats.redirect_cache_hits);
        assert_eq!(cache.current().await.unwrap().redirect_cache_hits, 1);

        ServiceStats::incr(&stats.redirect_cache_hits);
        assert_eq!(cache.current().await.unwrap().redirect_cache_hits, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.current().await.unwrap().redirect_cache_hits, 2);
    }

    #[tokio::test]
    async fn test_publish_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        let cache = stat_cache(store.clone(), Arc::new(ServiceStats::default()));
        store.set_available(false);
        assert!(cache.publish().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publisher_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(stat_cache(store.clone(), Arc::new(ServiceStats::default())));
        let (tx, rx) = tokio::sync::broadcast::channel(1);

        let handle = tokio::spawn(stats_publisher_worker(cache, Duration::from_secs(15), rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.live_keys().await, 1);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
