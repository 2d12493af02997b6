//! Request extractors for established identities.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use nvi_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn protected_handler(BearerAuth(token): BearerAuth) -> String {
//!     format!("Hello, {}!", token.owner_identity)
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .with_state(auth_state);
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::nested::{NestedTokenValidator, VerifiedOuterClaims};
use crate::oauth::{ClientCredentialIssuer, RequestContext};
use crate::trust_path::{TrustPath, TrustPathClassifier};
use crate::types::IssuedToken;

/// State required by the identity extractors and OAuth handlers.
///
/// Include it in the application state and expose it through `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    /// Issues, verifies and revokes opaque tokens.
    pub issuer: Arc<ClientCredentialIssuer>,

    /// Trust path classifier; `None` when the path stores are not configured.
    pub classifier: Option<Arc<TrustPathClassifier>>,

    /// Nested identity assertion validator; `None` when not configured.
    pub nested_validator: Option<Arc<NestedTokenValidator>>,

    /// Header carrying the outer identity assertion.
    pub assertion_header: String,
}

impl AuthState {
    /// Creates a new auth state.
    pub fn new(issuer: Arc<ClientCredentialIssuer>) -> Self {
        Self {
            issuer,
            classifier: None,
            nested_validator: None,
            assertion_header: String::new(),
        }
    }

    /// Enables trust path classification.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<TrustPathClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Enables identity corroboration through nested assertions read from
    /// `assertion_header`.
    #[must_use]
    pub fn with_nested_validator(
        mut self,
        validator: Arc<NestedTokenValidator>,
        assertion_header: impl Into<String>,
    ) -> Self {
        self.nested_validator = Some(validator);
        self.assertion_header = assertion_header.into();
        self
    }
}

/// Extractor that verifies an `Authorization: Bearer` opaque token.
///
/// # Errors
///
/// Rejects with `AuthError` (401) when the header is missing or the token is
/// unknown, revoked or expired.
pub struct BearerAuth(pub IssuedToken);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = auth_state.issuer.verify(authorization).await?;
        Ok(Self(token))
    }
}

/// Extractor exposing which trust path the client certificate belongs to.
///
/// Never rejects; `None` means no configured store recognizes the
/// certificate (or no verified certificate was presented).
pub struct ClientTrustPath(pub Option<TrustPath>);

impl<S> FromRequestParts<S> for ClientTrustPath
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let Some(classifier) = auth_state.classifier else {
            return Ok(Self(None));
        };

        let context =
            RequestContext::from_request(&parts.headers, &parts.uri, auth_state.issuer.mtls_config());
        Ok(Self(classifier.classify(&context)))
    }
}

/// Extractor that corroborates the bearer token owner with a nested identity
/// assertion.
///
/// The bearer token is verified first; its owner identity is then required
/// to appear in the relations of the embedded assertion.
///
/// # Errors
///
/// Rejects with the bearer error (401) when the token does not verify, with
/// `NestedTokenValidation` (401) when the assertion header is missing or the
/// assertion fails, and with `Configuration` (500) when no validator is set.
pub struct CorroboratedIdentity {
    /// The verified bearer token.
    pub token: IssuedToken,

    /// The validated outer assertion.
    pub assertion: VerifiedOuterClaims,
}

impl<S> FromRequestParts<S> for CorroboratedIdentity
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let validator = auth_state
            .nested_validator
            .clone()
            .ok_or_else(|| AuthError::configuration("nested identity validation is not configured"))?;

        let BearerAuth(token) = BearerAuth::from_request_parts(parts, state).await?;

        let assertion = parts
            .headers
            .get(auth_state.assertion_header.as_str())
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AuthError::nested_token(format!("missing {} header", auth_state.assertion_header))
            })?;

        let assertion = validator.validate(assertion, &token.owner_identity)?;
        Ok(Self { token, assertion })
    }
}
