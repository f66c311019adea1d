//! Seeded source of fixed-length alphanumeric strings.
//!
//! Used for short codes, captcha text, and challenge identities.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use surelink_common::constants::ALPHANUMERIC;

/// Shared random string generator
pub struct RandomGenerator {
    alphabet: Vec<char>,
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    /// Seed from the operating system
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_os_rng(), ALPHANUMERIC)
    }

    /// Deterministic generator, for reproducible codes
    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), ALPHANUMERIC)
    }

    /// Deterministic generator over a custom alphabet
    #[cfg(test)]
    pub fn seeded_with_alphabet(seed: u64, alphabet: &str) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), alphabet)
    }

    fn with_rng(rng: StdRng, alphabet: &str) -> Self {
        let alphabet: Vec<char> = if alphabet.is_empty() {
            ALPHANUMERIC.chars().collect()
        } else {
            alphabet.chars().collect()
        };
        Self {
            alphabet,
            rng: Mutex::new(rng),
        }
    }

    /// Generate a string of `length` characters drawn from the alphabet
    pub fn string(&self, length: usize) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect()
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
