//! Core types shared across Surelink components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rendered captcha puzzle with a known expected answer.
///
/// Owned by the challenge queue until issued; after issuance only the
/// `(identity -> answer)` pair survives, in the captcha cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// Unique identity, also the captcha cache key suffix
    pub identity: String,

    /// Base64 data URI of the rendered image
    pub image_data: String,

    /// Expected answer text (server-side only)
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub answer: String,
}

/// Wrapper for a challenge while resident in the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub challenge: CaptchaChallenge,

    /// Unix timestamp when rendered
    pub enqueued_at: i64,
}

impl QueueEntry {
    pub fn new(challenge: CaptchaChallenge) -> Self {
        Self {
            challenge,
            enqueued_at: Utc::now().timestamp(),
        }
    }
}

/// Challenge handed to a requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedChallenge {
    pub identity: String,
    pub image_data: String,
    pub expires_in_secs: u64,

    /// True when the queue was empty and the image was rendered on demand
    pub degraded: bool,
}

/// A persisted short code -> destination mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub code: String,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

impl ShortLink {
    pub fn new(code: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            destination: destination.into(),
            created_at: Utc::now(),
        }
    }
}

/// Memoized outcome of validating a destination host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostValidityRecord {
    pub valid: bool,

    /// Unix timestamp of the validation run
    pub checked_at: i64,
}

/// Aggregate service counters, eventually consistent within the stat TTL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStat {
    pub node_id: String,

    pub redirect_cache_hits: u64,
    pub redirect_cache_misses: u64,

    pub host_cache_hits: u64,
    pub host_cache_misses: u64,

    pub captchas_issued: u64,
    /// Issued through the synchronous render fallback
    pub captchas_degraded: u64,
    pub captchas_validated: u64,
    pub captchas_rejected: u64,

    pub links_created: u64,

    /// Unix timestamp of the snapshot
    pub captured_at: i64,
}
