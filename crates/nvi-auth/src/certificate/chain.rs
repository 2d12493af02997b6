//! Leaf-first `x5c` certificate chain validation.
//!
//! Only the leaf is checked cryptographically: its issuer name must equal the
//! subject of a trusted authority and its signature must verify with that
//! authority's key. Intermediate entries must still decode, otherwise the
//! chain is rejected as a whole.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::DecodingKey;
use x509_parser::parse_x509_certificate;

use super::authority::TrustStore;
use super::key::{KeyType, decoding_key};
use super::sha256_thumbprint;
use crate::AuthResult;
use crate::error::AuthError;

/// A leaf certificate that passed chain validation.
#[derive(Debug, Clone)]
pub struct ValidatedCertificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
}

impl ValidatedCertificate {
    /// The DER encoding of the leaf.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The leaf subject in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The leaf issuer in RFC 4514 form.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The `x5t#S256` thumbprint of the leaf.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        sha256_thumbprint(&self.der)
    }

    /// Extracts the leaf public key as a JWT decoding key.
    ///
    /// # Errors
    ///
    /// Returns `CertificateTrust` for key types outside RSA, EC, Ed25519 and
    /// Ed448, or keys that cannot be used for verification.
    pub fn decoding_key(&self) -> AuthResult<(KeyType, DecodingKey)> {
        let (_, cert) = parse_x509_certificate(&self.der)
            .map_err(|e| AuthError::certificate_trust(format!("invalid leaf certificate: {e}")))?;
        decoding_key(cert.public_key()).map_err(AuthError::certificate_trust)
    }
}

/// Verifies that a presented leaf was issued by a configured authority.
#[derive(Debug, Clone)]
pub struct CertificateChainValidator {
    trust_store: Arc<TrustStore>,
}

impl CertificateChainValidator {
    /// Creates a validator over a boot-time trust store.
    #[must_use]
    pub fn new(trust_store: Arc<TrustStore>) -> Self {
        Self { trust_store }
    }

    /// The trust store consulted by this validator.
    #[must_use]
    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    /// Validates an `x5c` chain (standard base64 DER, leaf first).
    ///
    /// # Errors
    ///
    /// Returns `CertificateTrust` if the chain is empty, any entry fails to
    /// decode, or the leaf is not issued and signed by a trusted authority.
    pub fn validate_chain<S: AsRef<str>>(&self, x5c: &[S]) -> AuthResult<ValidatedCertificate> {
        if x5c.is_empty() {
            return Err(AuthError::certificate_trust("x5c chain is empty"));
        }

        let chain = x5c
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let der = STANDARD.decode(entry.as_ref().trim()).map_err(|e| {
                    AuthError::certificate_trust(format!("x5c[{index}] is not base64: {e}"))
                })?;
                parse_x509_certificate(&der).map_err(|e| {
                    AuthError::certificate_trust(format!("x5c[{index}] is not a certificate: {e}"))
                })?;
                Ok(der)
            })
            .collect::<AuthResult<Vec<_>>>()?;

        let mut chain = chain.into_iter();
        let leaf = chain
            .next()
            .ok_or_else(|| AuthError::certificate_trust("x5c chain is empty"))?;
        self.validate_der(leaf)
    }

    /// Validates a single DER leaf certificate.
    ///
    /// # Errors
    ///
    /// Returns `CertificateTrust` if the certificate does not parse or is not
    /// issued and signed by a trusted authority.
    pub fn validate_der(&self, der: impl Into<Vec<u8>>) -> AuthResult<ValidatedCertificate> {
        let der = der.into();
        let (subject, issuer) = {
            let (_, leaf) = parse_x509_certificate(&der).map_err(|e| {
                AuthError::certificate_trust(format!("invalid leaf certificate: {e}"))
            })?;
            self.trust_store.verify_issued(&leaf)?;
            (leaf.subject().to_string(), leaf.issuer().to_string())
        };

        tracing::debug!(subject = %subject, issuer = %issuer, "Certificate chain validated");
        Ok(ValidatedCertificate {
            der,
            subject,
            issuer,
        })
    }
}
