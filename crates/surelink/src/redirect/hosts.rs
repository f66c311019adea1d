//! Host validity cache.
//!
//! Validating a destination host is slow (DNS), so outcomes are memoized for
//! a long TTL. A host whose real validity changes mid-TTL keeps its cached
//! outcome until expiry.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use surelink_common::constants::cache_keys;
use surelink_common::{HostValidityRecord, Result, SurelinkError};

use crate::stats::ServiceStats;
use crate::store::{self, CacheStore};

/// Decides whether a destination host is acceptable
#[async_trait]
pub trait HostValidator: Send + Sync {
    async fn validate(&self, host: &str) -> Result<bool>;
}

/// Accepts hosts that resolve to at least one routable address
pub struct DnsHostValidator {
    timeout: Duration,
}

impl DnsHostValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn is_routable(ip: &IpAddr) -> bool {
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast())
}

/// Resolver messages for a host that definitely does not exist
/// (glibc, musl, BSD/macOS and Windows wordings)
const NO_SUCH_HOST: &[&str] = &[
    "name or service not known",
    "no address associated with hostname",
    "nodename nor servname provided",
    "name does not resolve",
    "no such host is known",
];

/// True when a lookup error means "no such host" rather than a resolver fault
fn is_definite_miss(err: &std::io::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    NO_SUCH_HOST.iter().any(|needle| message.contains(needle))
}

#[async_trait]
impl HostValidator for DnsHostValidator {
    async fn validate(&self, host: &str) -> Result<bool> {
        let lookup = tokio::net::lookup_host((host, 80));
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(addrs)) => {
                let addrs: Vec<_> = addrs.map(|a| a.ip()).collect();
                Ok(!addrs.is_empty() && addrs.iter().all(is_routable))
            }
            Ok(Err(e)) if is_definite_miss(&e) => {
                tracing::debug!(host = %host, error = %e, "Host did not resolve");
                Ok(false)
            }
            Ok(Err(e)) => {
                // Outcome unknown, must not be memoized
                tracing::warn!(host = %host, error = %e, "DNS resolution failed");
                Err(SurelinkError::Resolver(format!("resolve {host}: {e}")))
            }
            Err(_) => Err(SurelinkError::Timeout(format!("resolve {host}"))),
        }
    }
}

/// Memoizes [`HostValidator`] outcomes in the shared store
pub struct HostValidityCache {
    store: Arc<dyn CacheStore>,
    validator: Arc<dyn HostValidator>,
    stats: Arc<ServiceStats>,
    ttl: Duration,
}

impl HostValidityCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        validator: Arc<dyn HostValidator>,
        stats: Arc<ServiceStats>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            validator,
            stats,
            ttl,
        }
    }

    /// Cached outcome if unexpired, otherwise validate and write back.
    ///
    /// Validator errors propagate without touching the cache.
    pub async fn check_host(&self, host: &str) -> Result<bool> {
        let key = cache_keys::host_validity(host);

        match store::get_json::<HostValidityRecord>(self.store.as_ref(), &key).await {
            Ok(Some(record)) => {
                ServiceStats::incr(&self.stats.host_cache_hits);
                return Ok(record.valid);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "Host validity cache unavailable");
            }
        }

        ServiceStats::incr(&self.stats.host_cache_misses);
        let valid = self.validator.validate(host).await?;

        let record = HostValidityRecord {
            valid,
            checked_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = store::set_json(self.store.as_ref(), &key, &record, self.ttl).await {
            tracing::warn!(host = %host, error = %e, "Failed to cache host validity");
        }

        tracing::debug!(host = %host, valid, "Host validated");
        Ok(valid)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::CountingValidator;
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::Ordering;

    const TTL: Duration = Duration::from_secs(120 * 60 * 60);

    fn cache(
        store: Arc<MemoryStore>,
        validator: Arc<CountingValidator>,
    ) -> HostValidityCache {
        HostValidityCache::new(store, validator, Arc::new(ServiceStats::default()), TTL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_memoized_within_ttl() {
        let validator = Arc::new(CountingValidator::default());
        let hosts = cache(Arc::new(MemoryStore::new()), validator.clone());

        assert!(hosts.check_host("example.com").await.unwrap());
        assert!(hosts.check_host("example.com").await.unwrap());
        assert_eq!(validator.calls(), 1);

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(hosts.check_host("example.com").await.unwrap());
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidated_after_expiry() {
        let validator = Arc::new(CountingValidator::default());
        let hosts = cache(Arc::new(MemoryStore::new()), validator.clone());

        hosts.check_host("example.com").await.unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        hosts.check_host("example.com").await.unwrap();
        assert_eq!(validator.calls(), 2);
    }

    #[tokio::test]
    async fn test_negative_outcomes_are_cached_too() {
        let validator = Arc::new(CountingValidator::denying(&["evil.test"]));
        let hosts = cache(Arc::new(MemoryStore::new()), validator.clone());

        assert!(!hosts.check_host("evil.test").await.unwrap());
        assert!(!hosts.check_host("evil.test").await.unwrap());
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn test_store_outage_falls_back_to_validation() {
        let store = Arc::new(MemoryStore::new());
        let validator = Arc::new(CountingValidator::default());
        let hosts = cache(store.clone(), validator.clone());
        store.set_available(false);

        assert!(hosts.check_host("example.com").await.unwrap());
        assert!(hosts.check_host("example.com").await.unwrap());
        assert_eq!(validator.calls(), 2);
    }

    #[tokio::test]
    async fn test_validator_error_is_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let validator = Arc::new(CountingValidator::default());
        let hosts = cache(store.clone(), validator.clone());

        validator.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            hosts.check_host("example.com").await,
            Err(SurelinkError::Resolver(_))
        ));
        assert_eq!(store.live_keys().await, 0);

        // Next call revalidates once the resolver is back
        validator.failing.store(false, Ordering::SeqCst);
        assert!(hosts.check_host("example.com").await.unwrap());
        assert_eq!(validator.calls(), 2);
    }

    #[test]
    fn test_resolver_error_classification() {
        let missing = std::io::Error::other(
            "failed to lookup address information: Name or service not known",
        );
        let flaky = std::io::Error::other(
            "failed to lookup address information: Temporary failure in name resolution",
        );
        assert!(is_definite_miss(&missing));
        assert!(!is_definite_miss(&flaky));
    }

    #[tokio::test]
    async fn test_ip_literals_skip_dns() {
        let validator = DnsHostValidator::new(Duration::from_secs(5));
        assert!(!validator.validate("::1").await.unwrap());
        assert!(validator.validate("2001:db8::1").await.unwrap());
        assert!(validator.validate("93.184.216.34").await.unwrap());
    }

    #[test]
    fn test_loopback_is_not_routable() {
        assert!(!is_routable(&"127.0.0.1".parse().unwrap()));
        assert!(!is_routable(&"0.0.0.0".parse().unwrap()));
        assert!(!is_routable(&"::1".parse().unwrap()));
        assert!(is_routable(&"93.184.216.34".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_dns_rejects_localhost() {
        let validator = DnsHostValidator::new(Duration::from_secs(5));
        assert!(!validator.validate("localhost").await.unwrap());
    }
}
