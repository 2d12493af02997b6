//! Identity core configuration.
//!
//! Trust anchors are referenced by path and loaded once at boot; nothing in
//! this module is re-read at runtime.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.mtls]
//! client_cert_header = "x-ssl-client-cert"
//! client_verify_header = "x-ssl-client-verify"
//!
//! [auth.oauth]
//! access_token_lifetime = "15m"
//! allowed_scopes = ["referral:read", "referral:write"]
//!
//! [auth.trust]
//! client_assertion_ca = "/etc/nvi/ca/assertion.pem"
//!
//! [auth.nested_token]
//! audience = "https://nvi.example.org"
//! signing_certificates_dir = "/etc/nvi/dezi"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration of the identity core.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Headers injected by the TLS-terminating proxy.
    pub mtls: MtlsConfig,

    /// OAuth 2.0 client credentials settings.
    pub oauth: OAuthConfig,

    /// Certificate authority bundles.
    pub trust: TrustConfig,

    /// Outer/embedded identity assertion settings.
    pub nested_token: NestedTokenConfig,
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mtls.validate()?;
        self.oauth.validate()?;
        self.trust.validate()?;
        self.nested_token.validate()?;
        Ok(())
    }
}

/// Transport headers set by the proxy that terminates mutual TLS.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MtlsConfig {
    /// Header carrying the client certificate PEM (raw or percent-encoded).
    pub client_cert_header: String,

    /// Header carrying the proxy's verification verdict.
    pub client_verify_header: String,

    /// Verdict value meaning the proxy verified the client certificate.
    pub verify_success_value: String,

    /// Scheme assumed for the request URL when no `x-forwarded-proto` is present.
    pub default_scheme: String,
}

impl Default for MtlsConfig {
    fn default() -> Self {
        Self {
            client_cert_header: "x-ssl-client-cert".to_string(),
            client_verify_header: "x-ssl-client-verify".to_string(),
            verify_success_value: "SUCCESS".to_string(),
            default_scheme: "https".to_string(),
        }
    }
}

impl MtlsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client_cert_header.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "mtls.client_cert_header",
                "must not be empty",
            ));
        }
        if self.client_verify_header.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "mtls.client_verify_header",
                "must not be empty",
            ));
        }
        if !matches!(self.default_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::invalid_value(
                "mtls.default_scheme",
                "must be http or https",
            ));
        }
        Ok(())
    }
}

/// OAuth 2.0 client credentials configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Lifetime of issued opaque bearer tokens.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Scopes a client may request.
    pub allowed_scopes: Vec<String>,

    /// Fixed prefix of every issued token.
    pub token_prefix: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(15 * 60),
            allowed_scopes: vec!["referral:read".to_string(), "referral:write".to_string()],
            token_prefix: "nvi_".to_string(),
        }
    }
}

impl OAuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_lifetime.is_zero() {
            return Err(ConfigError::invalid_value(
                "oauth.access_token_lifetime",
                "must be greater than zero",
            ));
        }
        if self.allowed_scopes.is_empty() {
            return Err(ConfigError::invalid_value(
                "oauth.allowed_scopes",
                "at least one scope is required",
            ));
        }
        if let Some(scope) = self
            .allowed_scopes
            .iter()
            .find(|s| s.is_empty() || s.contains(char::is_whitespace))
        {
            return Err(ConfigError::invalid_value(
                "oauth.allowed_scopes",
                format!("invalid scope '{scope}'"),
            ));
        }
        if self.token_prefix.is_empty() {
            return Err(ConfigError::invalid_value(
                "oauth.token_prefix",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Certificate authority bundles (PEM or DER files).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    /// CAs recognized for the direct client certificate path.
    pub direct_certificate_ca: Option<PathBuf>,

    /// CAs recognized for the OAuth client assertion path (transport certificate).
    pub oauth_certificate_ca: Option<PathBuf>,

    /// CAs that may issue client assertion signing certificates (`x5c`).
    pub client_assertion_ca: Option<PathBuf>,
}

impl TrustConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.direct_certificate_ca.is_some() != self.oauth_certificate_ca.is_some() {
            return Err(ConfigError::invalid_value(
                "trust",
                "direct_certificate_ca and oauth_certificate_ca must be configured together",
            ));
        }
        Ok(())
    }
}

/// Outer/embedded identity assertion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NestedTokenConfig {
    /// CA bundle that issues outer token signing certificates.
    pub ca_bundle: Option<PathBuf>,

    /// Directory of trusted embedded-token signer certificates.
    pub signing_certificates_dir: Option<PathBuf>,

    /// Expected `aud` of the outer token.
    pub audience: String,

    /// Clock skew tolerated on `exp`/`iat`/`nbf`, in seconds.
    pub leeway_seconds: u64,

    /// Request header carrying the outer identity assertion.
    pub assertion_header: String,
}

impl Default for NestedTokenConfig {
    fn default() -> Self {
        Self {
            ca_bundle: None,
            signing_certificates_dir: None,
            audience: "nvi".to_string(),
            leeway_seconds: 30,
            assertion_header: "x-nvi-identity-assertion".to_string(),
        }
    }
}

impl NestedTokenConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.audience.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "nested_token.audience",
                "must not be empty",
            ));
        }
        if axum::http::HeaderName::from_bytes(self.assertion_header.as_bytes()).is_err() {
            return Err(ConfigError::invalid_value(
                "nested_token.assertion_header",
                "must be a valid header name",
            ));
        }
        if self.ca_bundle.is_some() != self.signing_certificates_dir.is_some() {
            return Err(ConfigError::invalid_value(
                "nested_token",
                "ca_bundle and signing_certificates_dir must be configured together",
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A setting has an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Dotted path of the setting.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Creates a new `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
