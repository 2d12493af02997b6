//! Single-use assertion bookkeeping.
//!
//! A `jti` is accepted at most once while `now < exp`. Entries are purged
//! lazily on every check; once a `jti` has expired it may be presented again
//! with a fresh `exp`.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::JtiStorage;

/// Replay protection over an injected [`JtiStorage`].
#[derive(Clone)]
pub struct ReplayGuard {
    storage: Arc<dyn JtiStorage>,
}

impl ReplayGuard {
    /// Creates a guard over a shared replay store.
    #[must_use]
    pub fn new(storage: Arc<dyn JtiStorage>) -> Self {
        Self { storage }
    }

    /// Atomically checks and marks `jti` as used until `exp` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `Replay` if the `jti` is already marked with an unexpired
    /// `exp`, `TokenClaims` if `exp` is not a valid timestamp, or `Storage`
    /// if the store fails.
    pub async fn check_and_mark(&self, jti: &str, exp: i64) -> AuthResult<()> {
        let expires_at = OffsetDateTime::from_unix_timestamp(exp)
            .map_err(|e| AuthError::token_claims(format!("invalid exp: {e}")))?;

        let purged = self.storage.cleanup_expired().await?;
        if purged > 0 {
            tracing::trace!(purged, "Purged expired jti entries");
        }

        if !self.storage.mark_used(jti, expires_at).await? {
            tracing::warn!(jti = %jti, "Replayed assertion rejected");
            return Err(AuthError::replay(jti));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayGuard").finish_non_exhaustive()
    }
}
