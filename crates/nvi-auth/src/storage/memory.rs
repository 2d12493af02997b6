//! Process-local storage backed by `dashmap`.
//!
//! Check-and-mark relies on the per-shard write lock held by
//! [`DashMap::entry`], which makes it atomic for a single process. Clustered
//! deployments need a shared backend such as `nvi-auth-postgres`.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use super::{IssuedTokenStorage, JtiStorage};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::IssuedToken;

/// In-memory replay cache: `jti -> expires_at`.
#[derive(Debug, Default)]
pub struct InMemoryJtiStorage {
    used: DashMap<String, OffsetDateTime>,
}

impl InMemoryJtiStorage {
    /// Creates an empty replay cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Returns `true` if the cache holds no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[async_trait]
impl JtiStorage for InMemoryJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();
        match self.used.entry(jti.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return Ok(false);
                }
                entry.insert(expires_at);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();
        Ok(self.used.get(jti).is_some_and(|exp| *exp > now))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let before = self.used.len();
        self.used.retain(|_, expires_at| *expires_at > now);
        Ok(before.saturating_sub(self.used.len()) as u64)
    }
}

/// In-memory issued token table keyed by `token_hash`.
#[derive(Debug, Default)]
pub struct InMemoryIssuedTokenStorage {
    tokens: DashMap<String, IssuedToken>,
}

impl InMemoryIssuedTokenStorage {
    /// Creates an empty token table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IssuedTokenStorage for InMemoryIssuedTokenStorage {
    async fn create(&self, token: &IssuedToken) -> AuthResult<()> {
        match self.tokens.entry(token.token_hash.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage("duplicate token hash")),
            Entry::Vacant(entry) => {
                entry.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<IssuedToken>> {
        Ok(self.tokens.get(token_hash).map(|t| t.clone()))
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        match self.tokens.get_mut(token_hash) {
            Some(mut token) => {
                token.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::Duration;

    #[tokio::test]
    async fn test_mark_used_once() {
        let storage = InMemoryJtiStorage::new();
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);

        assert!(storage.mark_used("jti-1", exp).await.unwrap());
        assert!(!storage.mark_used("jti-1", exp).await.unwrap());
        assert!(storage.is_used("jti-1").await.unwrap());
        assert!(!storage.is_used("jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_jti_can_be_reused() {
        let storage = InMemoryJtiStorage::new();
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        let future = OffsetDateTime::now_utc() + Duration::minutes(5);

        assert!(storage.mark_used("jti-1", past).await.unwrap());
        assert!(!storage.is_used("jti-1").await.unwrap());
        assert!(storage.mark_used("jti-1", future).await.unwrap());
        assert!(!storage.mark_used("jti-1", future).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let storage = InMemoryJtiStorage::new();
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        let future = OffsetDateTime::now_utc() + Duration::minutes(5);
        storage.mark_used("old", past).await.unwrap();
        storage.mark_used("new", future).await.unwrap();

        assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
        assert_eq!(storage.len(), 1);
        assert!(storage.is_used("new").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_mark_used_single_winner() {
        let storage = Arc::new(InMemoryJtiStorage::new());
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.mark_used("shared", exp).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_token_create_find_revoke() {
        let storage = InMemoryIssuedTokenStorage::new();
        let token = IssuedToken::new("nvi_abc", "12341234", vec![], Duration::minutes(15));

        storage.create(&token).await.unwrap();
        assert!(storage.create(&token).await.is_err());

        let found = storage.find_by_hash(&token.token_hash).await.unwrap().unwrap();
        assert_eq!(found, token);

        assert!(storage.revoke(&token.token_hash).await.unwrap());
        let found = storage.find_by_hash(&token.token_hash).await.unwrap().unwrap();
        assert!(found.revoked);

        assert!(!storage.revoke("unknown").await.unwrap());
        assert!(storage.find_by_hash("unknown").await.unwrap().is_none());
    }
}
