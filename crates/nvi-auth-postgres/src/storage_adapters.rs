//! Arc-owning storage adapters for use with the identity core.
//!
//! These adapters wrap the lifetime-based store types and own an
//! `Arc<PgPool>`, so they can be used as `Arc<dyn Storage>`.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use nvi_auth::storage::{
    IssuedTokenStorage as IssuedTokenStorageTrait, JtiStorage as JtiStorageTrait,
};
use nvi_auth::{AuthResult, IssuedToken};

use crate::PgPool;
use crate::issued_token::IssuedTokenStore;
use crate::used_jti::UsedJtiStore;

// =============================================================================
// Arc-Owning Issued Token Storage
// =============================================================================

/// Arc-owning PostgreSQL issued token storage adapter.
#[derive(Clone)]
pub struct ArcIssuedTokenStorage {
    pool: Arc<PgPool>,
}

impl ArcIssuedTokenStorage {
    /// Create a new Arc-owning issued token storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IssuedTokenStorageTrait for ArcIssuedTokenStorage {
    async fn create(&self, token: &IssuedToken) -> AuthResult<()> {
        let storage = IssuedTokenStore::new(&self.pool);
        Ok(storage.create(token).await?)
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<IssuedToken>> {
        let storage = IssuedTokenStore::new(&self.pool);
        Ok(storage.find_by_hash(token_hash).await?)
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        let storage = IssuedTokenStore::new(&self.pool);
        Ok(storage.revoke(token_hash).await?)
    }
}

// =============================================================================
// Arc-Owning JTI Storage
// =============================================================================

/// Arc-owning PostgreSQL used JTI storage adapter.
#[derive(Clone)]
pub struct ArcJtiStorage {
    pool: Arc<PgPool>,
}

impl ArcJtiStorage {
    /// Create a new Arc-owning JTI storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JtiStorageTrait for ArcJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        let storage = UsedJtiStore::new(&self.pool);
        Ok(storage.mark_used(jti, expires_at).await?)
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        let storage = UsedJtiStore::new(&self.pool);
        Ok(storage.is_used(jti).await?)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let storage = UsedJtiStore::new(&self.pool);
        let removed = storage.cleanup_expired().await?;
        if removed > 0 {
            tracing::debug!(removed, "Expired JTI rows deleted");
        }
        Ok(removed)
    }
}
