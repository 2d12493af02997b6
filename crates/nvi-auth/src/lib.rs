//! # nvi-auth
//!
//! Caller identity and pseudonym exchange core of the NVI referral index.
//!
//! This crate provides:
//! - X.509 chain validation against boot-time trust stores
//! - A thumbprint-indexed registry of third-party assertion signers
//! - Nested (LRS/DEZI) identity assertion validation
//! - Single-use `jti` replay protection
//! - OAuth 2.0 client credentials bound to mutual TLS, with opaque tokens
//! - Pseudonym exchange over an encrypted, OPRF-blinded envelope
//! - Trust path classification of client certificates
//!
//! ## Modules
//!
//! - [`certificate`] - trust stores, chain validation, signer registry
//! - [`nested`] - outer/embedded identity assertion validation
//! - [`replay`] - `jti` single-use guard
//! - [`oauth`] - client assertion checks and token issuance
//! - [`pseudonym`] - envelope decryption and OPRF unblinding
//! - [`trust_path`] - direct certificate vs. client assertion path
//! - [`storage`] - storage traits and in-memory backends
//! - [`middleware`] - axum extractors and error responses
//! - [`http`] - axum handlers for the OAuth endpoints

pub mod certificate;
pub mod config;
pub mod error;
pub mod http;
pub mod jose;
pub mod middleware;
pub mod nested;
pub mod oauth;
pub mod pseudonym;
pub mod replay;
pub mod storage;
pub mod trust_path;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use certificate::{
    CertificateChainValidator, SignerLookup, SigningCertificateEntry, SigningCertificateRegistry,
    TrustStore, TrustedCertificateAuthority, ValidatedCertificate,
};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{RevocationForm, TokenResponse, revoke_handler, token_handler};
pub use middleware::{AuthState, BearerAuth, ClientTrustPath, CorroboratedIdentity};
pub use nested::{NestedTokenValidator, Relation, VerifiedOuterClaims};
pub use oauth::{ClientCredentialIssuer, RequestContext, TokenRequest, VerifiedClientAssertion};
pub use pseudonym::{EnvelopeDecrypter, OprfUnblinder, PseudonymExchanger, RsaOaepDecrypter};
pub use replay::ReplayGuard;
pub use storage::{InMemoryIssuedTokenStorage, InMemoryJtiStorage, IssuedTokenStorage, JtiStorage};
pub use trust_path::{TrustPath, TrustPathClassifier};
pub use types::IssuedToken;

/// Type alias for identity core results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use nvi_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::certificate::{CertificateChainValidator, SigningCertificateRegistry, TrustStore};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::middleware::{AuthState, BearerAuth, ClientTrustPath, CorroboratedIdentity};
    pub use crate::nested::NestedTokenValidator;
    pub use crate::oauth::{ClientCredentialIssuer, RequestContext, TokenRequest};
    pub use crate::pseudonym::PseudonymExchanger;
    pub use crate::replay::ReplayGuard;
    pub use crate::storage::{IssuedTokenStorage, JtiStorage};
    pub use crate::trust_path::{TrustPath, TrustPathClassifier};
    pub use crate::types::IssuedToken;
}
