//! Trusted certificate authorities.
//!
//! A [`TrustStore`] is loaded once at boot from a PEM bundle or DER file and
//! is immutable afterwards. Rotating an authority requires a restart.

use std::path::Path;

use x509_parser::certificate::X509Certificate;
use x509_parser::parse_x509_certificate;

use super::parse_certificates;
use crate::AuthResult;
use crate::error::AuthError;

/// One root or intermediate certificate recognized as an issuer.
#[derive(Debug, Clone)]
pub struct TrustedCertificateAuthority {
    der: Vec<u8>,
    subject_raw: Vec<u8>,
    subject: String,
}

impl TrustedCertificateAuthority {
    /// Creates an authority from a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the certificate cannot be parsed.
    pub fn from_der(der: impl Into<Vec<u8>>) -> AuthResult<Self> {
        let der = der.into();
        let (subject_raw, subject) = {
            let (_, cert) = parse_x509_certificate(&der).map_err(|e| {
                AuthError::configuration(format!("invalid CA certificate: {e}"))
            })?;
            (cert.subject().as_raw().to_vec(), cert.subject().to_string())
        };

        Ok(Self {
            der,
            subject_raw,
            subject,
        })
    }

    /// The DER encoding of the authority certificate.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The subject name in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns `true` if `leaf` names this authority as its issuer.
    ///
    /// Names are compared on their raw DER encoding.
    fn is_issuer_of(&self, leaf: &X509Certificate<'_>) -> bool {
        leaf.issuer().as_raw() == self.subject_raw.as_slice()
    }

    /// Verifies the signature of `leaf` with this authority's public key.
    fn verify_signature(&self, leaf: &X509Certificate<'_>) -> Result<(), String> {
        let (_, ca) = parse_x509_certificate(&self.der).map_err(|e| e.to_string())?;
        leaf.verify_signature(Some(ca.public_key()))
            .map_err(|e| format!("signature verification failed: {e}"))
    }
}

/// A set of trusted authorities loaded at boot.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    authorities: Vec<TrustedCertificateAuthority>,
}

impl TrustStore {
    /// Creates a trust store from already parsed authorities.
    #[must_use]
    pub fn new(authorities: Vec<TrustedCertificateAuthority>) -> Self {
        Self { authorities }
    }

    /// Parses a PEM bundle or a single DER certificate.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if any certificate cannot be parsed.
    pub fn from_bytes(bytes: &[u8]) -> AuthResult<Self> {
        let authorities = parse_certificates(bytes)?
            .into_iter()
            .map(TrustedCertificateAuthority::from_der)
            .collect::<AuthResult<Vec<_>>>()?;
        Ok(Self::new(authorities))
    }

    /// Loads a trust store from a file.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            AuthError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let store = Self::from_bytes(&bytes)?;
        tracing::info!(
            path = %path.display(),
            authorities = store.len(),
            "Loaded trust store"
        );
        Ok(store)
    }

    /// Number of authorities in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.authorities.len()
    }

    /// Returns `true` if the store holds no authority.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.authorities.is_empty()
    }

    /// Iterates the authorities in load order.
    pub fn authorities(&self) -> impl Iterator<Item = &TrustedCertificateAuthority> {
        self.authorities.iter()
    }

    /// Checks that `leaf` was issued and signed by one of the authorities.
    ///
    /// Authorities whose subject does not equal the leaf issuer are never
    /// consulted. If several share the issuer name, any valid signature passes.
    ///
    /// # Errors
    ///
    /// Returns `CertificateTrust` on issuer mismatch or signature failure.
    pub fn verify_issued(&self, leaf: &X509Certificate<'_>) -> AuthResult<()> {
        let mut candidates = self
            .authorities
            .iter()
            .filter(|ca| ca.is_issuer_of(leaf))
            .peekable();

        if candidates.peek().is_none() {
            return Err(AuthError::certificate_trust(format!(
                "issuer '{}' does not match a trusted authority",
                leaf.issuer()
            )));
        }

        let mut last_error = String::new();
        for ca in candidates {
            match ca.verify_signature(leaf) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }
        Err(AuthError::certificate_trust(last_error))
    }
}
