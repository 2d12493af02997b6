//! Used assertion JTI storage for PostgreSQL.
//!
//! A JTI row lives until its assertion would have expired anyway. The
//! conditional upsert in [`UsedJtiStore::mark_used`] is the single atomic
//! check-and-mark step; concurrent presentations race on the primary key.

use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;

use crate::{PgPool, StorageResult};

/// Used JTI storage operations.
pub struct UsedJtiStore<'a> {
    pool: &'a PgPool,
}

impl<'a> UsedJtiStore<'a> {
    /// Create a new store with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Mark a JTI used unless an unexpired row already exists.
    ///
    /// Returns `true` on first use, `false` on replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the database statement fails.
    pub async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> StorageResult<bool> {
        let marked: Option<String> = query_scalar(
            r#"
            INSERT INTO used_jti (jti, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (jti) DO UPDATE
                SET expires_at = EXCLUDED.expires_at
                WHERE used_jti.expires_at <= NOW()
            RETURNING jti
            "#,
        )
        .bind(jti)
        .bind(expires_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(marked.is_some())
    }

    /// Check whether a JTI is marked and unexpired.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_used(&self, jti: &str) -> StorageResult<bool> {
        let exists: bool = query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM used_jti WHERE jti = $1 AND expires_at > NOW()
            )
            "#,
        )
        .bind(jti)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Delete expired rows and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn cleanup_expired(&self) -> StorageResult<u64> {
        let result = query("DELETE FROM used_jti WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
