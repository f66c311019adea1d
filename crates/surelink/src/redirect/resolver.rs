//! Read-through redirection cache over the persistent link store.

use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

use surelink_common::constants::cache_keys;
use surelink_common::{Result, ShortLink, SurelinkError};

use super::HostValidityCache;
use crate::links::{InsertOutcome, LinkStore};
use crate::random::RandomGenerator;
use crate::stats::ServiceStats;
use crate::store::CacheStore;

/// Tunables for code generation and caching
#[derive(Debug, Clone)]
pub struct RedirectionConfig {
    pub code_length: usize,
    pub max_attempts: u32,
    pub ttl: Duration,
    /// Codes that would collide with fixed routes
    pub reserved: &'static [&'static str],
}

pub struct RedirectionService {
    cache: Arc<dyn CacheStore>,
    links: Arc<dyn LinkStore>,
    hosts: Arc<HostValidityCache>,
    random: Arc<RandomGenerator>,
    stats: Arc<ServiceStats>,
    config: RedirectionConfig,
}

impl RedirectionService {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        links: Arc<dyn LinkStore>,
        hosts: Arc<HostValidityCache>,
        random: Arc<RandomGenerator>,
        stats: Arc<ServiceStats>,
        config: RedirectionConfig,
    ) -> Self {
        Self {
            cache,
            links,
            hosts,
            random,
            stats,
            config,
        }
    }

    /// Destination for `code`, from cache when possible.
    ///
    /// Misses go to the link store and populate the cache. Unknown codes are
    /// not cached. Concurrent misses may each hit the store, which is harmless
    /// since lookups are side-effect free.
    pub async fn resolve(&self, code: &str) -> Result<String> {
        let key = cache_keys::redirection(code);

        match self.cache.get(&key).await {
            Ok(Some(destination)) => {
                ServiceStats::incr(&self.stats.redirect_cache_hits);
                return Ok(destination);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(code = %code, error = %e, "Redirection cache unavailable, using store");
            }
        }
        ServiceStats::incr(&self.stats.redirect_cache_misses);

        let link = self
            .links
            .find_by_code(code)
            .await?
            .ok_or_else(|| SurelinkError::LinkNotFound(code.to_string()))?;

        self.populate(&link).await;
        Ok(link.destination)
    }

    /// Persist `destination` under a freshly generated short code
    pub async fn create(&self, destination: &str) -> Result<ShortLink> {
        let destination = destination.trim();
        let host = destination_host(destination)?;

        if !self.hosts.check_host(&host).await? {
            return Err(SurelinkError::HostRejected(host));
        }

        for attempt in 1..=self.config.max_attempts {
            let code = self.random.string(self.config.code_length);
            if self.config.reserved.contains(&code.as_str()) {
                tracing::debug!(code = %code, attempt, "Generated reserved short code, regenerating");
                continue;
            }
            let link = ShortLink::new(code, destination);

            match self.links.insert(&link).await? {
                InsertOutcome::Inserted => {
                    ServiceStats::incr(&self.stats.links_created);
                    tracing::info!(code = %link.code, host = %host, "Short link created");
                    self.populate(&link).await;
                    return Ok(link);
                }
                InsertOutcome::Conflict => {
                    tracing::debug!(code = %link.code, attempt, "Short code collision, regenerating");
                }
            }
        }

        tracing::error!(
            attempts = self.config.max_attempts,
            "Could not find a free short code"
        );
        Err(SurelinkError::CodeGenerationExhausted {
            attempts: self.config.max_attempts,
        })
    }

    /// Drop the cached copy of `code`, forcing the next resolve to the store
    #[cfg(test)]
    pub async fn evict(&self, code: &str) -> Result<bool> {
        self.cache.delete(&cache_keys::redirection(code)).await
    }

    async fn populate(&self, link: &ShortLink) {
        let key = cache_keys::redirection(&link.code);
        if let Err(e) = self
            .cache
            .set_ex(&key, &link.destination, self.config.ttl)
            .await
        {
            tracing::warn!(code = %link.code, error = %e, "Failed to cache redirection");
        }
    }
}

/// Host of an absolute http(s) URL
fn destination_host(destination: &str) -> Result<String> {
    let url = Url::parse(destination)
        .map_err(|e| SurelinkError::InvalidDestination(format!("{destination}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SurelinkError::InvalidDestination(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }

    // IPv6 literals are unbracketed so the resolver can parse them
    match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => Ok(domain.to_ascii_lowercase()),
        Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
        Some(Host::Ipv6(addr)) => Ok(addr.to_string()),
        _ => Err(SurelinkError::InvalidDestination(format!(
            "missing host: {destination}"
        ))),
    }
}
