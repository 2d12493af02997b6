//! Table definitions for the identity core.
//!
//! Statements are idempotent and run once at boot.

use sqlx_core::query::query;
use tracing::debug;

use crate::{PgPool, StorageResult};

/// DDL statements, applied in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS issued_token (
        id UUID PRIMARY KEY,
        token_hash TEXT NOT NULL UNIQUE,
        owner_identity TEXT NOT NULL,
        scopes TEXT[] NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS used_jti (
        jti TEXT PRIMARY KEY,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS used_jti_expires_at_idx ON used_jti (expires_at)
    "#,
];

/// Creates the identity core tables if they do not exist.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in SCHEMA_STATEMENTS {
        query(statement).execute(pool).await?;
    }
    debug!(statements = SCHEMA_STATEMENTS.len(), "Identity schema ensured");
    Ok(())
}
