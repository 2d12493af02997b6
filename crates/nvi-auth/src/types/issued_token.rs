//! Opaque bearer token record.
//!
//! The plaintext token is handed to the client exactly once. Only its SHA-256
//! hash is persisted, so a leaked table cannot be replayed as credentials.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An issued access token as persisted by [`IssuedTokenStorage`].
///
/// State machine: `Active -> Revoked` through an explicit revoke, or
/// `Active -> Expired` once `expires_at` passes. Both are terminal. Expiry is
/// only detected when the token is verified; records are never swept.
///
/// [`IssuedTokenStorage`]: crate::storage::IssuedTokenStorage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// Hex-encoded SHA-256 of the plaintext token. Unique.
    pub token_hash: String,

    /// Identity the token was issued to (the client assertion subject).
    pub owner_identity: String,

    /// Granted scopes.
    pub scopes: Vec<String>,

    /// Whether the token was explicitly revoked.
    pub revoked: bool,

    /// When this token stops being valid.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When this token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl IssuedToken {
    /// Creates a new active record for `token`.
    #[must_use]
    pub fn new(
        token: &str,
        owner_identity: impl Into<String>,
        scopes: Vec<String>,
        lifetime: time::Duration,
    ) -> Self {
        let created_at = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            token_hash: Self::hash_token(token),
            owner_identity: owner_identity.into(),
            scopes,
            revoked: false,
            expires_at: created_at + lifetime,
            created_at,
        }
    }

    /// Returns `true` once `expires_at` has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Returns `true` if this token is neither revoked nor expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }

    /// Space-separated scope string as used on the OAuth wire.
    #[must_use]
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Hash a token value using SHA-256.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate an opaque token: `prefix` followed by 256 random bits,
    /// base64url encoded.
    #[must_use]
    pub fn generate_token(prefix: &str) -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        format!("{prefix}{}", URL_SAFE_NO_PAD.encode(bytes))
    }
}
