//! CAPTCHA issuance and single-use validation.

use std::sync::Arc;
use std::time::Duration;

use surelink_common::constants::cache_keys;
use surelink_common::{IssuedChallenge, Result, SurelinkError};

use super::{CaptchaQueue, ChallengeFactory};
use crate::stats::ServiceStats;
use crate::store::CacheStore;

/// Hands out challenges and verifies one answer attempt per challenge
pub struct CaptchaService {
    queue: Arc<CaptchaQueue>,
    factory: Arc<ChallengeFactory>,
    store: Arc<dyn CacheStore>,
    stats: Arc<ServiceStats>,
    /// Issued challenge TTL
    ttl: Duration,
}

impl CaptchaService {
    pub fn new(
        queue: Arc<CaptchaQueue>,
        factory: Arc<ChallengeFactory>,
        store: Arc<dyn CacheStore>,
        stats: Arc<ServiceStats>,
        ttl: Duration,
    ) -> Self {
        Self {
            queue,
            factory,
            store,
            stats,
            ttl,
        }
    }

    /// Issue a challenge, rendering one on demand when the queue is drained
    pub async fn issue(&self) -> Result<IssuedChallenge> {
        let (challenge, degraded) = match self.queue.dequeue().await {
            Ok(challenge) => (challenge, false),
            Err(SurelinkError::QueueEmpty) => {
                tracing::warn!("Captcha queue empty, rendering on demand");
                ServiceStats::incr(&self.stats.captchas_degraded);
                (self.factory.create()?, true)
            }
            Err(e) => return Err(e),
        };

        self.store
            .set_ex(
                &cache_keys::captcha(&challenge.identity),
                &challenge.answer,
                self.ttl,
            )
            .await?;

        ServiceStats::incr(&self.stats.captchas_issued);
        tracing::debug!(identity = %challenge.identity, degraded, "Issued CAPTCHA challenge");

        Ok(IssuedChallenge {
            identity: challenge.identity,
            image_data: challenge.image_data,
            expires_in_secs: self.ttl.as_secs(),
            degraded,
        })
    }

    /// Consume the challenge and compare the answer.
    ///
    /// The entry is removed by the lookup itself, whatever the outcome.
    /// Unknown, expired, and already-used identities all fail with
    /// `ChallengeNotFound`. Comparison is exact (case-sensitive).
    pub async fn validate(&self, identity: &str, answer: &str) -> Result<bool> {
        if identity.is_empty() {
            return Err(SurelinkError::ChallengeNotFound);
        }

        let Some(expected) = self.store.take(&cache_keys::captcha(identity)).await? else {
            tracing::debug!(identity = %identity, "Challenge expired or invalid");
            return Err(SurelinkError::ChallengeNotFound);
        };

        let matched = answer == expected;
        if matched {
            ServiceStats::incr(&self.stats.captchas_validated);
            tracing::info!(identity = %identity, "CAPTCHA verified successfully");
        } else {
            ServiceStats::incr(&self.stats.captchas_rejected);
            tracing::debug!(identity = %identity, "CAPTCHA verification failed");
        }

        Ok(matched)
    }

    pub fn queue(&self) -> &CaptchaQueue {
        &self.queue
    }
}
