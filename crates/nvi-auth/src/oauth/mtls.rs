//! Client certificate metadata injected by the TLS-terminating proxy.
//!
//! The proxy verifies the TLS handshake and forwards two headers: the client
//! certificate PEM (raw, or percent-encoded as nginx's
//! `$ssl_client_escaped_cert`) and its verification verdict. Both are
//! required; anything else fails closed.

use axum::http::{HeaderMap, Uri};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use x509_parser::parse_x509_certificate;

use crate::AuthResult;
use crate::certificate::sha256_thumbprint;
use crate::config::MtlsConfig;
use crate::error::AuthError;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// The transport certificate presented by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    der: Vec<u8>,
    fingerprint: String,
}

impl ClientCertificate {
    /// Decodes a certificate forwarded by the proxy.
    ///
    /// Accepts a PEM block with its line breaks intact, flattened onto one
    /// line, or percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the value is not a single X.509 certificate.
    pub fn from_header_value(value: &str) -> AuthResult<Self> {
        let decoded = if value.contains('%') {
            urlencoding::decode(value)
                .map_err(|e| AuthError::invalid_client(format!("client certificate: {e}")))?
                .into_owned()
        } else {
            value.to_string()
        };

        let body = decoded
            .split_once(PEM_BEGIN)
            .and_then(|(_, rest)| rest.split_once(PEM_END))
            .map(|(body, _)| body)
            .ok_or_else(|| AuthError::invalid_client("client certificate is not PEM"))?;
        let base64: String = body.chars().filter(|c| !c.is_whitespace()).collect();

        let der = STANDARD
            .decode(base64)
            .map_err(|e| AuthError::invalid_client(format!("client certificate: {e}")))?;
        Self::from_der(der)
    }

    /// Wraps a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the bytes are not an X.509 certificate.
    pub fn from_der(der: Vec<u8>) -> AuthResult<Self> {
        parse_x509_certificate(&der)
            .map_err(|e| AuthError::invalid_client(format!("client certificate: {e}")))?;
        let fingerprint = sha256_thumbprint(&der);
        Ok(Self { der, fingerprint })
    }

    /// The DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Base64url SHA-256 of the DER, comparable with `cnf.x5t#S256`.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Per-request transport facts the identity checks depend on.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Absolute URL of the endpoint as the caller addressed it.
    pub request_url: String,

    /// Raw client certificate header value.
    pub client_cert: Option<String>,

    /// Raw verification verdict header value.
    pub client_verify: Option<String>,
}

impl RequestContext {
    /// Creates a context without client certificate metadata.
    #[must_use]
    pub fn new(request_url: impl Into<String>) -> Self {
        Self {
            request_url: request_url.into(),
            ..Self::default()
        }
    }

    /// Attaches the proxy-provided certificate and verdict.
    #[must_use]
    pub fn with_client_certificate(
        mut self,
        cert: impl Into<String>,
        verify: impl Into<String>,
    ) -> Self {
        self.client_cert = Some(cert.into());
        self.client_verify = Some(verify.into());
        self
    }

    /// Builds the context of an inbound HTTP request.
    ///
    /// The URL is `scheme://host/path`: the scheme comes from
    /// `x-forwarded-proto` (or the configured default), the host from
    /// `x-forwarded-host` or `Host`. The query string is not part of it.
    #[must_use]
    pub fn from_request(headers: &HeaderMap, uri: &Uri, config: &MtlsConfig) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let scheme = header("x-forwarded-proto")
            .or(uri.scheme_str())
            .unwrap_or(config.default_scheme.as_str());
        let host = header("x-forwarded-host")
            .or_else(|| header("host"))
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");

        Self {
            request_url: format!("{scheme}://{host}{}", uri.path()),
            client_cert: header(config.client_cert_header.as_str()).map(str::to_string),
            client_verify: header(config.client_verify_header.as_str()).map(str::to_string),
        }
    }

    /// Returns the verified client certificate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if either header is missing, the verdict is
    /// not `success_value`, or the certificate does not decode.
    pub fn client_certificate(&self, success_value: &str) -> AuthResult<ClientCertificate> {
        let verify = self
            .client_verify
            .as_deref()
            .ok_or_else(|| AuthError::invalid_client("client certificate verification status missing"))?;
        if verify != success_value {
            return Err(AuthError::invalid_client(format!(
                "client certificate verification status is '{verify}'"
            )));
        }

        let cert = self
            .client_cert
            .as_deref()
            .ok_or_else(|| AuthError::invalid_client("client certificate missing"))?;
        ClientCertificate::from_header_value(cert)
    }
}
