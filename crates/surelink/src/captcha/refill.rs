//! Periodic captcha refill job.
//!
//! Each tick tops the shared queue up to capacity. Failures are logged and
//! the loop waits for the next tick; nothing here may bring the process down.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use surelink_common::{Result, SurelinkError};

use super::{CaptchaQueue, ChallengeFactory};

/// Outcome of one refill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillReport {
    pub deficit: usize,
    pub enqueued: usize,
}

pub struct RefillJob {
    queue: Arc<CaptchaQueue>,
    factory: Arc<ChallengeFactory>,
}

impl RefillJob {
    pub fn new(queue: Arc<CaptchaQueue>, factory: Arc<ChallengeFactory>) -> Self {
        Self { queue, factory }
    }

    /// Render and enqueue challenges until the queue is full.
    ///
    /// A challenge is rendered completely before its single enqueue call, so
    /// dropping this future between awaits never leaves partial state behind.
    pub async fn run(&self) -> Result<RefillReport> {
        let len = self.queue.len().await?;
        let deficit = self.queue.capacity().saturating_sub(len);
        let mut report = RefillReport {
            deficit,
            enqueued: 0,
        };

        for _ in 0..deficit {
            let challenge = self.factory.create()?;

            match self.queue.enqueue(challenge).await {
                Ok(()) => report.enqueued += 1,
                Err(SurelinkError::QueueFull) => {
                    // Another producer got there first
                    tracing::warn!(
                        enqueued = report.enqueued,
                        deficit,
                        "Captcha queue filled up mid-refill"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }

            tokio::task::yield_now().await;
        }

        Ok(report)
    }
}

/// Background worker that runs the refill job on a fixed cadence
pub async fn captcha_refill_worker(
    job: Arc<RefillJob>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(interval = ?interval, "Captcha refill worker started");

    // First tick fires immediately, warming the pool at startup
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    outcome = tokio::time::timeout(interval, job.run()) => match outcome {
                        Ok(Ok(report)) if report.enqueued > 0 => {
                            tracing::debug!(
                                enqueued = report.enqueued,
                                deficit = report.deficit,
                                "Captcha queue refilled"
                            );
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "Captcha refill failed");
                        }
                        Err(_) => {
                            tracing::warn!("Captcha refill overran its tick, abandoning pass");
                        }
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("Captcha refill worker shutting down mid-pass");
                        break;
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Captcha refill worker shutting down...");
                break;
            }
        }
    }
}
