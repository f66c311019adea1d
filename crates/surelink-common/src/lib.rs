//! # Surelink Common
//!
//! Shared types, errors, and constants used across Surelink components.
//!
//! ## Modules
//! - `types` - Core data structures (CaptchaChallenge, ShortLink, ServiceStat, etc.)
//! - `error` - Error taxonomy for the captcha and caching engine
//! - `constants` - Default tunables and cache key layout

pub mod constants;
pub mod error;
pub mod types;

pub use error::SurelinkError;
pub use types::*;

/// Result alias used by the engine's services
pub type Result<T, E = SurelinkError> = std::result::Result<T, E>;
