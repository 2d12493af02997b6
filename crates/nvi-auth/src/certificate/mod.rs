//! X.509 trust anchors, chain validation and signer registries.
//!
//! - [`authority`] - trusted certificate authorities and trust stores
//! - [`chain`] - leaf-first `x5c` chain validation
//! - [`key`] - leaf public key classification for JWT verification
//! - [`registry`] - thumbprint-indexed registry of assertion signers

pub mod authority;
pub mod chain;
pub mod key;
pub mod registry;

pub use authority::{TrustStore, TrustedCertificateAuthority};
pub use chain::{CertificateChainValidator, ValidatedCertificate};
pub use key::KeyType;
pub use registry::{SignerLookup, SigningCertificateEntry, SigningCertificateRegistry};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use x509_parser::pem::Pem;

use crate::AuthResult;
use crate::error::AuthError;

/// Computes the `x5t#S256` thumbprint of a DER certificate.
///
/// SHA-256 over the DER bytes, base64url without padding.
#[must_use]
pub fn sha256_thumbprint(der: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(der))
}

/// Splits a PEM bundle (or a single DER blob) into DER certificates.
///
/// Non-certificate PEM blocks are skipped.
///
/// # Errors
///
/// Returns `Configuration` if the PEM is malformed or contains no certificate.
pub fn parse_certificates(bytes: &[u8]) -> AuthResult<Vec<Vec<u8>>> {
    if !bytes.windows(10).any(|w| w == b"-----BEGIN") {
        return Ok(vec![bytes.to_vec()]);
    }

    let mut certificates = Vec::new();
    for pem in Pem::iter_from_buffer(bytes) {
        let pem = pem.map_err(|e| AuthError::configuration(format!("invalid PEM: {e}")))?;
        if pem.label == "CERTIFICATE" {
            certificates.push(pem.contents);
        }
    }

    if certificates.is_empty() {
        return Err(AuthError::configuration("PEM contains no certificate"));
    }
    Ok(certificates)
}
