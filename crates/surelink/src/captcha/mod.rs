//! CAPTCHA issuance pipeline.
//!
//! Producer side: the refill job renders challenges into the shared queue.
//! Consumer side: requests dequeue a challenge and park its answer in the
//! captcha cache until a single validation attempt consumes it.

mod queue;
mod refill;
mod renderer;
mod service;

pub use queue::CaptchaQueue;
pub use refill::{RefillJob, RefillReport, captcha_refill_worker};
pub use renderer::{CaptchaRenderer, SvgRenderer};
pub use service::CaptchaService;

use std::sync::Arc;

use surelink_common::{CaptchaChallenge, Result};

use crate::random::RandomGenerator;

/// Builds fresh challenges: random text, random identity, rendered image
pub struct ChallengeFactory {
    random: Arc<RandomGenerator>,
    renderer: Arc<dyn CaptchaRenderer>,
    text_length: usize,
    id_length: usize,
}

impl ChallengeFactory {
    pub fn new(
        random: Arc<RandomGenerator>,
        renderer: Arc<dyn CaptchaRenderer>,
        text_length: usize,
        id_length: usize,
    ) -> Self {
        Self {
            random,
            renderer,
            text_length,
            id_length,
        }
    }

    pub fn create(&self) -> Result<CaptchaChallenge> {
        let answer = self.random.string(self.text_length);
        let image_data = self.renderer.render(&answer)?;

        Ok(CaptchaChallenge {
            identity: self.random.string(self.id_length),
            image_data,
            answer,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use surelink_common::SurelinkError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Renderer that records calls and can be switched to fail
    #[derive(Default)]
    pub struct StubRenderer {
        pub renders: AtomicUsize,
        pub failing: AtomicBool,
    }

    impl CaptchaRenderer for StubRenderer {
        fn render(&self, text: &str) -> Result<String> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SurelinkError::Render("stub failure".into()));
            }
            self.renders.fetch_add(1, Ordering::SeqCst);
            Ok(format!("stub:{text}"))
        }
    }

    pub fn factory(renderer: Arc<StubRenderer>) -> Arc<ChallengeFactory> {
        Arc::new(ChallengeFactory::new(
            Arc::new(RandomGenerator::seeded(7)),
            renderer,
            6,
            24,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_factory_lengths() {
        let renderer = Arc::new(StubRenderer::default());
        let challenge = factory(renderer.clone()).create().unwrap();

        assert_eq!(challenge.answer.len(), 6);
        assert_eq!(challenge.identity.len(), 24);
        assert_eq!(challenge.image_data, format!("stub:{}", challenge.answer));
    }
}
