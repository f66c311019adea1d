//! Configuration management for Surelink.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use surelink_common::constants::{
    CAPTCHA_ID_LENGTH, CAPTCHA_QUEUE_MAX_SIZE, CAPTCHA_REFILL_INTERVAL_SECS, CAPTCHA_TEXT_LENGTH,
    CAPTCHA_TTL_SECS, DEFAULT_DATABASE_URL, DEFAULT_FONT_PATH, DEFAULT_LISTEN_ADDR,
    DEFAULT_REDIS_URL, HOST_VALIDITY_TTL_SECS, MAX_CODE_GENERATION_ATTEMPTS, REDIRECTION_TTL_SECS,
    SERVICE_STAT_FLUSH_INTERVAL_SECS, SERVICE_STAT_TTL_SECS, SHORT_CODE_LENGTH,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// This node's unique ID (auto-generated if not set)
    #[serde(default = "generate_node_id")]
    pub node_id: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub captcha: CaptchaConfig,

    #[serde(default)]
    pub links: LinksConfig,

    #[serde(default)]
    pub hosts: HostsConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// Where cache and link state live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkBackend {
    Postgres,
    Memory,
}

/// Store connections
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_cache_backend")]
    pub cache_backend: CacheBackend,

    #[serde(default = "default_link_backend")]
    pub link_backend: LinkBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Postgres connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Deadline for a single store round trip
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,

    /// Attempts per store operation on transient failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_backend: default_cache_backend(),
            link_backend: default_link_backend(),
            redis_url: default_redis_url(),
            database_url: default_database_url(),
            op_timeout_ms: default_op_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// CAPTCHA-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Path to font file for CAPTCHA text
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,

    /// Pre-rendered pool size
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_text_length")]
    pub text_length: usize,

    #[serde(default = "default_id_length")]
    pub id_length: usize,

    /// Challenge validity in seconds
    #[serde(default = "default_captcha_ttl")]
    pub ttl_secs: u64,

    /// Refill cadence in seconds
    #[serde(default = "default_refill_interval")]
    pub refill_interval_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            font_path: default_font_path(),
            queue_capacity: default_queue_capacity(),
            text_length: default_text_length(),
            id_length: default_id_length(),
            ttl_secs: default_captcha_ttl(),
            refill_interval_secs: default_refill_interval(),
        }
    }
}

/// Short link configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,

    /// Redirection cache TTL in seconds
    #[serde(default = "default_redirection_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: u32,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            ttl_secs: default_redirection_ttl(),
            max_generation_attempts: default_max_generation_attempts(),
        }
    }
}

/// Host validity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HostsConfig {
    #[serde(default = "default_host_validity_ttl")]
    pub validity_ttl_secs: u64,

    /// DNS lookup deadline
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_ms: u64,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            validity_ttl_secs: default_host_validity_ttl(),
            resolve_timeout_ms: default_resolve_timeout(),
        }
    }
}

/// Service stat configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stat_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_stat_flush_interval")]
    pub flush_interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_stat_ttl(),
            flush_interval_secs: default_stat_flush_interval(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_cache_backend() -> CacheBackend { CacheBackend::Redis }
fn default_link_backend() -> LinkBackend { LinkBackend::Postgres }
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_database_url() -> String { DEFAULT_DATABASE_URL.to_string() }
fn default_op_timeout() -> u64 { 500 }
fn default_max_attempts() -> u32 { 2 }
fn default_font_path() -> PathBuf { PathBuf::from(DEFAULT_FONT_PATH) }
fn default_queue_capacity() -> usize { CAPTCHA_QUEUE_MAX_SIZE }
fn default_text_length() -> usize { CAPTCHA_TEXT_LENGTH }
fn default_id_length() -> usize { CAPTCHA_ID_LENGTH }
fn default_captcha_ttl() -> u64 { CAPTCHA_TTL_SECS }
fn default_refill_interval() -> u64 { CAPTCHA_REFILL_INTERVAL_SECS }
fn default_code_length() -> usize { SHORT_CODE_LENGTH }
fn default_redirection_ttl() -> u64 { REDIRECTION_TTL_SECS }
fn default_max_generation_attempts() -> u32 { MAX_CODE_GENERATION_ATTEMPTS }
fn default_host_validity_ttl() -> u64 { HOST_VALIDITY_TTL_SECS }
fn default_resolve_timeout() -> u64 { 3000 }
fn default_stat_ttl() -> u64 { SERVICE_STAT_TTL_SECS }
fn default_stat_flush_interval() -> u64 { SERVICE_STAT_FLUSH_INTERVAL_SECS }

fn generate_node_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    format!("node-{:08x}", rng.random::<u32>())
}

impl AppConfig {
    /// Load configuration from file and `SURELINK__*` env vars, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();
        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("SURELINK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to load config")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.store.redis_url = redis_url.clone();
        }
        if let Some(ref database_url) = args.database_url {
            config.store.database_url = database_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if args.memory {
            config.store.cache_backend = CacheBackend::Memory;
            config.store.link_backend = LinkBackend::Memory;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.captcha.queue_capacity == 0 {
            bail!("captcha.queue_capacity must be greater than zero");
        }
        if self.captcha.text_length == 0 || self.captcha.id_length == 0 {
            bail!("captcha text and id lengths must be greater than zero");
        }
        if self.captcha.refill_interval_secs == 0 {
            bail!("captcha.refill_interval_secs must be greater than zero");
        }
        if self.links.code_length == 0 {
            bail!("links.code_length must be greater than zero");
        }
        if self.links.max_generation_attempts == 0 {
            bail!("links.max_generation_attempts must be greater than zero");
        }
        if self.stats.flush_interval_secs == 0 {
            bail!("stats.flush_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.store.op_timeout_ms)
    }
}

impl CaptchaConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            node_id: generate_node_id(),
            store: StoreConfig::default(),
            captcha: CaptchaConfig::default(),
            links: LinksConfig::default(),
            hosts: HostsConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}
