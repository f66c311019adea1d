//! Application state and shared resources.
//!
//! Store handles are built once at startup and injected into every service.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use surelink_common::constants::RESERVED_SHORT_CODES;

use crate::captcha::{
    CaptchaQueue, CaptchaRenderer, CaptchaService, ChallengeFactory, RefillJob, SvgRenderer,
};
use crate::config::{AppConfig, CacheBackend, LinkBackend};
use crate::links::{LinkStore, MemoryLinkStore, PgLinkStore};
use crate::random::RandomGenerator;
use crate::redirect::{
    DnsHostValidator, HostValidator, HostValidityCache, RedirectionConfig, RedirectionService,
};
use crate::stats::{ServiceStats, StatCache};
use crate::store::{CacheStore, MemoryStore, RedisStore, RedisStoreConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Shared cache store (queue, captcha, redirection, host, stat keys)
    pub cache: Arc<dyn CacheStore>,

    /// Captcha issuance and validation
    pub captcha: Arc<CaptchaService>,

    /// Captcha queue producer
    pub refill: Arc<RefillJob>,

    /// Link creation and resolution
    pub redirection: Arc<RedirectionService>,

    /// Published service counters
    pub stat_cache: Arc<StatCache>,
}

impl AppState {
    /// Connect to the configured stores and wire the services
    pub async fn new(config: AppConfig) -> Result<Self> {
        // Font asset must exist before anything is rendered
        let renderer = SvgRenderer::from_font_path(&config.captcha.font_path)
            .context("Captcha font asset unavailable")?;

        let cache: Arc<dyn CacheStore> = match config.store.cache_backend {
            CacheBackend::Redis => {
                let store = RedisStore::connect(
                    &config.store.redis_url,
                    RedisStoreConfig {
                        op_timeout: config.op_timeout(),
                        max_attempts: config.store.max_attempts,
                    },
                )
                .await?;
                tracing::info!(url = %config.store.redis_url, "Redis connected");
                Arc::new(store)
            }
            CacheBackend::Memory => {
                tracing::warn!("Using in-process cache store; state is not shared between nodes");
                Arc::new(MemoryStore::new())
            }
        };

        let links: Arc<dyn LinkStore> = match config.store.link_backend {
            LinkBackend::Postgres => {
                let store = PgLinkStore::connect(
                    &config.store.database_url,
                    Duration::from_secs(5),
                )
                .await?;
                store.ensure_schema().await?;
                tracing::info!("Postgres connected");
                Arc::new(store)
            }
            LinkBackend::Memory => {
                tracing::warn!("Using in-process link store; links are lost on restart");
                Arc::new(MemoryLinkStore::new())
            }
        };

        let validator = Arc::new(DnsHostValidator::new(Duration::from_millis(
            config.hosts.resolve_timeout_ms,
        )));

        Ok(Self::from_parts(
            config,
            cache,
            links,
            Arc::new(renderer),
            validator,
            Arc::new(RandomGenerator::from_entropy()),
        ))
    }

    /// Wire services around already-built collaborators
    pub fn from_parts(
        config: AppConfig,
        cache: Arc<dyn CacheStore>,
        links: Arc<dyn LinkStore>,
        renderer: Arc<dyn CaptchaRenderer>,
        validator: Arc<dyn HostValidator>,
        random: Arc<RandomGenerator>,
    ) -> Self {
        let stats = Arc::new(ServiceStats::default());

        let queue = Arc::new(CaptchaQueue::new(
            cache.clone(),
            config.captcha.queue_capacity,
        ));
        let factory = Arc::new(ChallengeFactory::new(
            random.clone(),
            renderer,
            config.captcha.text_length,
            config.captcha.id_length,
        ));
        let refill = Arc::new(RefillJob::new(queue.clone(), factory.clone()));
        let captcha = Arc::new(CaptchaService::new(
            queue,
            factory,
            cache.clone(),
            stats.clone(),
            config.captcha.ttl(),
        ));

        let hosts = Arc::new(HostValidityCache::new(
            cache.clone(),
            validator,
            stats.clone(),
            Duration::from_secs(config.hosts.validity_ttl_secs),
        ));
        let redirection = Arc::new(RedirectionService::new(
            cache.clone(),
            links,
            hosts,
            random,
            stats.clone(),
            RedirectionConfig {
                code_length: config.links.code_length,
                max_attempts: config.links.max_generation_attempts,
                ttl: Duration::from_secs(config.links.ttl_secs),
                reserved: RESERVED_SHORT_CODES,
            },
        ));

        let stat_cache = Arc::new(StatCache::new(
            cache.clone(),
            stats,
            config.node_id.clone(),
            Duration::from_secs(config.stats.ttl_secs),
        ));

        Self {
            config: Arc::new(config),
            cache,
            captcha,
            refill,
            redirection,
            stat_cache,
        }
    }
}
