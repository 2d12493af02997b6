//! Issued access token storage trait.
//!
//! The contract is deliberately small: keyed insert, lookup and update of
//! [`IssuedToken`] by `token_hash`. Each call must be a single atomic
//! storage operation.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::IssuedToken;

/// Storage trait for opaque access tokens.
#[async_trait]
pub trait IssuedTokenStorage: Send + Sync {
    /// Stores a new token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be stored (duplicate hash,
    /// storage unavailable).
    async fn create(&self, token: &IssuedToken) -> AuthResult<()>;

    /// Finds a token record by its hash.
    ///
    /// Records are returned regardless of revocation or expiry; callers must
    /// check [`IssuedToken::is_valid`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<IssuedToken>>;

    /// Marks the token with `token_hash` as revoked.
    ///
    /// # Returns
    ///
    /// `true` if a record was found and revoked, `false` if the hash is
    /// unknown. Revoking an already revoked token returns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<bool>;
}
