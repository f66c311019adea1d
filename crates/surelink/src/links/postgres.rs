//! Postgres link store.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;

use surelink_common::{Result, ShortLink, SurelinkError};

use super::{InsertOutcome, LinkStore};

const SCHEMA: &str = include_str!("../../migrations/0001_short_links.sql");

pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        PgLinkStore { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        Ok(Self::new(pool))
    }

    /// Create the links table if missing
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to apply link schema")?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        let row = sqlx::query(
            r#"
SELECT code, destination, created_at
FROM short_links
WHERE code = $1
"#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SurelinkError::Store(format!("query link: {e}")))?;

        Ok(row.map(|row| ShortLink {
            code: row.get::<String, _>("code"),
            destination: row.get::<String, _>("destination"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        }))
    }

    async fn insert(&self, link: &ShortLink) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
INSERT INTO short_links (code, destination, created_at)
VALUES ($1, $2, $3)
"#,
        )
        .bind(&link.code)
        .bind(&link.destination)
        .bind(link.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(SurelinkError::Store(format!("insert link: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keys_on_code() {
        assert!(SCHEMA.contains("short_links"));
        assert!(SCHEMA.contains("PRIMARY KEY"));
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
