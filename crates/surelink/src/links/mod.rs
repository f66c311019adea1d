//! Persistent link store.
//!
//! The authoritative short code -> destination mapping. Caches in front of
//! it are pure accelerators.

mod memory;
mod postgres;

pub use memory::MemoryLinkStore;
pub use postgres::PgLinkStore;

use async_trait::async_trait;
use surelink_common::{Result, ShortLink};

/// Result of an insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The short code is already taken
    Conflict,
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Look up a link by code. Idempotent and side-effect free.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>>;

    /// Insert a new link; a taken code yields [`InsertOutcome::Conflict`]
    async fn insert(&self, link: &ShortLink) -> Result<InsertOutcome>;
}
