//! OAuth 2.0 client credentials bound to mutual TLS.
//!
//! A client authenticates with a JWT assertion that is signed by a
//! CA-issued certificate and bound (`cnf.x5t#S256`) to the certificate it
//! presented over mutual TLS. A successful exchange yields an opaque bearer
//! token whose SHA-256 hash is persisted.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::client_assertion::{
    check_assertion_shape, check_confirmation, check_grant_type, replay_claims, resolve_scopes,
    subject, verify_assertion_chain, verify_assertion_signature,
};
use super::mtls::RequestContext;
use crate::AuthResult;
use crate::certificate::{CertificateChainValidator, ValidatedCertificate};
use crate::config::{MtlsConfig, OAuthConfig};
use crate::error::AuthError;
use crate::replay::ReplayGuard;
use crate::storage::IssuedTokenStorage;
use crate::types::IssuedToken;

/// Token endpoint form parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// Must be `client_credentials`.
    #[serde(default)]
    pub grant_type: String,

    /// Space-separated requested scopes.
    pub scope: Option<String>,

    /// Must be the JWT bearer URN.
    #[serde(default)]
    pub client_assertion_type: String,

    /// The signed client assertion.
    #[serde(default)]
    pub client_assertion: String,
}

/// A client assertion that passed every check.
#[derive(Debug, Clone)]
pub struct VerifiedClientAssertion {
    /// Assertion claims as signed.
    pub claims: Map<String, Value>,

    /// Assertion subject; owner of the token about to be issued.
    pub subject: String,

    /// Granted scopes.
    pub scopes: Vec<String>,

    /// The assertion signing certificate.
    pub signing_certificate: ValidatedCertificate,

    /// Fingerprint of the transport certificate.
    pub client_fingerprint: String,
}

/// Issues and verifies opaque access tokens.
#[derive(Clone)]
pub struct ClientCredentialIssuer {
    oauth: OAuthConfig,
    mtls: MtlsConfig,
    chain_validator: CertificateChainValidator,
    replay_guard: ReplayGuard,
    token_storage: Arc<dyn IssuedTokenStorage>,
}

impl ClientCredentialIssuer {
    /// Creates an issuer.
    ///
    /// `chain_validator` holds the CA bundle that issues assertion signing
    /// certificates.
    #[must_use]
    pub fn new(
        oauth: OAuthConfig,
        mtls: MtlsConfig,
        chain_validator: CertificateChainValidator,
        replay_guard: ReplayGuard,
        token_storage: Arc<dyn IssuedTokenStorage>,
    ) -> Self {
        Self {
            oauth,
            mtls,
            chain_validator,
            replay_guard,
            token_storage,
        }
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub fn access_token_lifetime(&self) -> Duration {
        self.oauth.access_token_lifetime
    }

    /// The transport header configuration.
    #[must_use]
    pub fn mtls_config(&self) -> &MtlsConfig {
        &self.mtls
    }

    /// Runs the client assertion checks in order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing check; see
    /// [`client_assertion`](super::client_assertion) for the mapping.
    pub async fn validate(
        &self,
        request: &TokenRequest,
        context: &RequestContext,
    ) -> AuthResult<VerifiedClientAssertion> {
        check_grant_type(&request.grant_type)?;
        let scopes = resolve_scopes(request.scope.as_deref(), &self.oauth.allowed_scopes)?;

        let client_certificate = context.client_certificate(&self.mtls.verify_success_value)?;

        check_assertion_shape(&request.client_assertion_type, &request.client_assertion)?;
        let signing_certificate =
            verify_assertion_chain(&request.client_assertion, &self.chain_validator)?;
        let claims = verify_assertion_signature(
            &request.client_assertion,
            &signing_certificate,
            &context.request_url,
        )?;

        let (jti, exp) = replay_claims(&claims)?;
        self.replay_guard.check_and_mark(jti, exp).await?;

        check_confirmation(&claims, client_certificate.fingerprint())?;
        let subject = subject(&claims)?.to_string();

        tracing::debug!(
            subject = %subject,
            signer = %signing_certificate.subject(),
            "Client assertion accepted"
        );
        Ok(VerifiedClientAssertion {
            claims,
            subject,
            scopes,
            signing_certificate,
            client_fingerprint: client_certificate.fingerprint().to_string(),
        })
    }

    /// Mints an opaque token for `identity` and persists its hash.
    ///
    /// The plaintext is returned exactly once and never stored.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the record cannot be persisted.
    pub async fn generate_token(&self, identity: &str, scopes: &[String]) -> AuthResult<String> {
        let token = IssuedToken::generate_token(&self.oauth.token_prefix);
        let lifetime = time::Duration::try_from(self.oauth.access_token_lifetime)
            .map_err(|e| AuthError::configuration(format!("access token lifetime: {e}")))?;
        let record = IssuedToken::new(&token, identity, scopes.to_vec(), lifetime);

        self.token_storage.create(&record).await?;
        tracing::info!(
            token_id = %record.id,
            owner = %identity,
            scope = %record.scope(),
            "Access token issued"
        );
        Ok(token)
    }

    /// Verifies an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the header is missing or not a bearer
    /// credential, `InvalidToken` for unknown tokens, `TokenRevoked` or
    /// `TokenExpired` for tokens that are no longer active.
    pub async fn verify(&self, authorization: Option<&str>) -> AuthResult<IssuedToken> {
        let authorization =
            authorization.ok_or_else(|| AuthError::unauthorized("Missing Authorization header"))?;
        let token = parse_bearer(authorization)
            .ok_or_else(|| AuthError::unauthorized("Authorization header is not a Bearer token"))?;

        let record = self
            .token_storage
            .find_by_hash(&IssuedToken::hash_token(token))
            .await?
            .ok_or_else(|| AuthError::invalid_token("Unknown access token"))?;

        if record.is_revoked() {
            tracing::debug!(token_id = %record.id, "Revoked token presented");
            return Err(AuthError::TokenRevoked);
        }
        if record.is_expired() {
            tracing::debug!(token_id = %record.id, "Expired token presented");
            return Err(AuthError::TokenExpired);
        }
        Ok(record)
    }

    /// Revokes the token with `token_hash`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no token has that hash.
    pub async fn revoke(&self, token_hash: &str) -> AuthResult<()> {
        if !self.token_storage.revoke(token_hash).await? {
            return Err(AuthError::not_found("Unknown token hash"));
        }
        tracing::info!(token_hash = %token_hash, "Access token revoked");
        Ok(())
    }

    /// Revokes the token with `token_hash` on behalf of `owner_identity`.
    ///
    /// Tokens of other owners are reported exactly like unknown hashes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no token of `owner_identity` has that hash.
    pub async fn revoke_owned(&self, owner_identity: &str, token_hash: &str) -> AuthResult<()> {
        let record = self
            .token_storage
            .find_by_hash(token_hash)
            .await?
            .ok_or_else(|| AuthError::not_found("Unknown token hash"))?;

        if record.owner_identity != owner_identity {
            tracing::warn!(
                token_id = %record.id,
                requested_by = %owner_identity,
                "Revocation of another owner's token refused"
            );
            return Err(AuthError::not_found("Unknown token hash"));
        }
        self.revoke(token_hash).await
    }
}

impl std::fmt::Debug for ClientCredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialIssuer")
            .field("oauth", &self.oauth)
            .field("mtls", &self.mtls)
            .finish_non_exhaustive()
    }
}

/// Extracts the credential of a `Bearer` authorization header.
///
/// The scheme is matched case-insensitively.
fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::sha256_thumbprint;
    use crate::oauth::client_assertion::JWT_BEARER_ASSERTION_TYPE;
    use crate::storage::{InMemoryIssuedTokenStorage, InMemoryJtiStorage};
    use crate::test_support::{CertificateAuthority, IssuedCertificate, now};
    use serde_json::json;

    const TOKEN_URL: &str = "https://nvi.example.org/oauth/token";

    struct Fixture {
        issuer: ClientCredentialIssuer,
        storage: Arc<InMemoryIssuedTokenStorage>,
        signer: IssuedCertificate,
        transport: IssuedCertificate,
    }

    fn fixture_with(oauth: OAuthConfig) -> Fixture {
        let assertion_ca = CertificateAuthority::new("Assertion CA");
        let transport_ca = CertificateAuthority::new("Transport CA");
        let signer = assertion_ca.issue_rsa("client.example.org", 0);
        let transport = transport_ca.issue_ec("client.example.org");

        let storage = Arc::new(InMemoryIssuedTokenStorage::new());
        let issuer = ClientCredentialIssuer::new(
            oauth,
            MtlsConfig::default(),
            CertificateChainValidator::new(Arc::new(assertion_ca.trust_store())),
            ReplayGuard::new(Arc::new(InMemoryJtiStorage::new())),
            storage.clone(),
        );

        Fixture {
            issuer,
            storage,
            signer,
            transport,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(OAuthConfig::default())
    }

    impl Fixture {
        fn assertion(&self, jti: &str, fingerprint: &str) -> String {
            let claims = json!({
                "iss": "12341234",
                "sub": "12341234",
                "aud": TOKEN_URL,
                "iat": now(),
                "exp": now() + 60,
                "jti": jti,
                "cnf": {"x5t#S256": fingerprint},
            });
            self.signer
                .sign_jwt(&claims, |h| h.x5c = Some(vec![self.signer.x5c()]))
        }

        fn request(&self, assertion: String) -> TokenRequest {
            TokenRequest {
                grant_type: "client_credentials".to_string(),
                scope: Some("referral:read".to_string()),
                client_assertion_type: JWT_BEARER_ASSERTION_TYPE.to_string(),
                client_assertion: assertion,
            }
        }

        fn context(&self) -> RequestContext {
            RequestContext::new(TOKEN_URL).with_client_certificate(self.transport.pem(), "SUCCESS")
        }

        fn fingerprint(&self) -> String {
            sha256_thumbprint(self.transport.der())
        }
    }

    #[tokio::test]
    async fn test_validate_bound_assertion() {
        let f = fixture();
        let request = f.request(f.assertion("jti-1", &f.fingerprint()));

        let verified = f.issuer.validate(&request, &f.context()).await.unwrap();
        assert_eq!(verified.subject, "12341234");
        assert_eq!(verified.scopes, vec!["referral:read"]);
        assert_eq!(verified.client_fingerprint, f.fingerprint());
    }

    #[tokio::test]
    async fn test_other_certificate_fingerprint_fails() {
        let f = fixture();
        let other = CertificateAuthority::new("Transport CA").issue_ec("other.example.org");
        let request = f.request(f.assertion("jti-1", &sha256_thumbprint(other.der())));

        let err = f.issuer.validate(&request, &f.context()).await.unwrap_err();
        assert!(matches!(err, AuthError::ProofOfPossession { .. }));
    }

    #[tokio::test]
    async fn test_replayed_assertion_fails() {
        let f = fixture();
        let request = f.request(f.assertion("jti-1", &f.fingerprint()));

        f.issuer.validate(&request, &f.context()).await.unwrap();
        let err = f.issuer.validate(&request, &f.context()).await.unwrap_err();
        assert!(matches!(err, AuthError::Replay { .. }));
    }

    #[tokio::test]
    async fn test_missing_transport_certificate_fails_closed() {
        let f = fixture();
        let request = f.request(f.assertion("jti-1", &f.fingerprint()));

        let err = f
            .issuer
            .validate(&request, &RequestContext::new(TOKEN_URL))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_wrong_request_url_fails() {
        let f = fixture();
        let request = f.request(f.assertion("jti-1", &f.fingerprint()));
        let mut context = f.context();
        context.request_url = format!("{TOKEN_URL}/");

        let err = f.issuer.validate(&request, &context).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenClaims { .. }));
    }

    #[tokio::test]
    async fn test_grant_and_scope_checked_first() {
        let f = fixture();
        let mut request = f.request("garbage".to_string());
        request.grant_type = "password".to_string();
        let err = f.issuer.validate(&request, &f.context()).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedGrantType { .. }));

        let mut request = f.request("garbage".to_string());
        request.scope = Some("admin".to_string());
        let err = f.issuer.validate(&request, &f.context()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidScope { .. }));

        let request = f.request("garbage".to_string());
        let err = f.issuer.validate(&request, &f.context()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_generate_then_verify() {
        let f = fixture();
        let scopes = vec!["referral:read".to_string()];
        let token = f.issuer.generate_token("12341234", &scopes).await.unwrap();
        assert!(token.starts_with("nvi_"));

        let record = f
            .issuer
            .verify(Some(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(record.owner_identity, "12341234");
        assert_eq!(record.scopes, scopes);
        assert_eq!(record.token_hash, IssuedToken::hash_token(&token));

        let stored = f.storage.find_by_hash(&record.token_hash).await.unwrap().unwrap();
        assert_ne!(stored.token_hash, token);
    }

    #[tokio::test]
    async fn test_verify_after_revoke() {
        let f = fixture();
        let token = f.issuer.generate_token("12341234", &[]).await.unwrap();
        let header = format!("Bearer {token}");

        f.issuer.revoke(&IssuedToken::hash_token(&token)).await.unwrap();
        let err = f.issuer.verify(Some(&header)).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_verify_after_lifetime() {
        let f = fixture_with(OAuthConfig {
            access_token_lifetime: Duration::from_millis(1),
            ..OAuthConfig::default()
        });
        let token = f.issuer.generate_token("12341234", &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = f
            .issuer
            .verify(Some(&format!("Bearer {token}")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_and_unknown() {
        let f = fixture();
        assert!(matches!(
            f.issuer.verify(None).await.unwrap_err(),
            AuthError::Unauthorized { .. }
        ));
        assert!(matches!(
            f.issuer.verify(Some("Basic abc")).await.unwrap_err(),
            AuthError::Unauthorized { .. }
        ));
        assert!(matches!(
            f.issuer.verify(Some("Bearer nvi_unknown")).await.unwrap_err(),
            AuthError::InvalidToken { .. }
        ));
    }

    #[tokio::test]
    async fn test_revoke_unknown_is_not_found() {
        let f = fixture();
        let err = f.issuer.revoke("deadbeef").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_revoke_owned_refuses_other_owners() {
        let f = fixture();
        let token = f.issuer.generate_token("12341234", &[]).await.unwrap();
        let hash = IssuedToken::hash_token(&token);
        let header = format!("Bearer {token}");

        let err = f.issuer.revoke_owned("56785678", &hash).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
        assert!(f.issuer.verify(Some(&header)).await.is_ok());

        f.issuer.revoke_owned("12341234", &hash).await.unwrap();
        assert!(matches!(
            f.issuer.verify(Some(&header)).await.unwrap_err(),
            AuthError::TokenRevoked
        ));
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("abc"), None);
    }
}
