//! JWT ID (JTI) storage trait for replay prevention.
//!
//! # Implementation Notes
//!
//! `mark_used` must check and mark in a single atomic step. Two concurrent
//! presentations of the same `jti` must never both succeed, so a read followed
//! by an unsynchronized write is not a valid implementation.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// Storage trait for JWT ID (JTI) tracking.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Atomically marks a JTI as used unless it is already marked with an
    /// unexpired `expires_at`.
    ///
    /// A JTI whose previous entry has expired may be marked again; the entry
    /// then carries the new `expires_at`.
    ///
    /// # Returns
    ///
    /// `true` if the JTI was marked (first use), `false` on replay.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    ///
    /// # Atomicity
    ///
    /// A conditional upsert is enough in SQL backends:
    ///
    /// ```sql
    /// INSERT INTO used_jti (jti, expires_at) VALUES ($1, $2)
    /// ON CONFLICT (jti) DO UPDATE SET expires_at = EXCLUDED.expires_at
    /// WHERE used_jti.expires_at <= NOW()
    /// RETURNING jti
    /// ```
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool>;

    /// Returns `true` if the JTI is marked and not yet expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_used(&self, jti: &str) -> AuthResult<bool>;

    /// Deletes expired JTI entries and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
