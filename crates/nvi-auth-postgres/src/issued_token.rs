//! Issued access token storage.
//!
//! Rows are keyed by `token_hash`; the plaintext token never reaches the
//! database.

use nvi_auth::IssuedToken;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

type IssuedTokenTuple = (
    Uuid,
    String,
    String,
    Vec<String>,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

fn from_tuple(row: IssuedTokenTuple) -> IssuedToken {
    IssuedToken {
        id: row.0,
        token_hash: row.1,
        owner_identity: row.2,
        scopes: row.3,
        revoked: row.4,
        expires_at: row.5,
        created_at: row.6,
    }
}

/// Issued token storage operations.
pub struct IssuedTokenStore<'a> {
    pool: &'a PgPool,
}

impl<'a> IssuedTokenStore<'a> {
    /// Create a new store with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new token record.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the hash is already stored, or a database error.
    pub async fn create(&self, token: &IssuedToken) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO issued_token
                (id, token_hash, owner_identity, scopes, revoked, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(&token.token_hash)
        .bind(&token.owner_identity)
        .bind(&token.scopes)
        .bind(token.revoked)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict("issued token hash already exists");
            }
            StorageError::from(e)
        })?;

        Ok(())
    }

    /// Find a token record by hash, regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_hash(&self, token_hash: &str) -> StorageResult<Option<IssuedToken>> {
        let row: Option<IssuedTokenTuple> = query_as(
            r#"
            SELECT id, token_hash, owner_identity, scopes, revoked, expires_at, created_at
            FROM issued_token
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(from_tuple))
    }

    /// Mark a token revoked. Returns `false` if the hash is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn revoke(&self, token_hash: &str) -> StorageResult<bool> {
        let id: Option<Uuid> = query_scalar(
            r#"
            UPDATE issued_token
            SET revoked = TRUE
            WHERE token_hash = $1
            RETURNING id
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(id.is_some())
    }
}
