//! Envelope decryption.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;

use super::envelope::JweHeader;
use crate::AuthResult;
use crate::error::AuthError;

/// Decrypts a compact JWE envelope into its plaintext.
///
/// Implementations report failures as plain descriptions; the exchanger
/// folds them into `PseudonymPrimitive`.
pub trait EnvelopeDecrypter: Send + Sync {
    /// Decrypts `envelope`.
    fn decrypt(&self, envelope: &str) -> Result<Vec<u8>, String>;
}

/// `RSA-OAEP-256` key unwrap with `A256GCM` content decryption.
pub struct RsaOaepDecrypter {
    key: RsaPrivateKey,
}

impl RsaOaepDecrypter {
    /// Wraps an RSA private key.
    #[must_use]
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Parses a PKCS#8 or PKCS#1 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the PEM holds no RSA private key.
    pub fn from_pem(pem: &str) -> AuthResult<Self> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(Self::new)
            .map_err(|e| AuthError::configuration(format!("invalid envelope key: {e}")))
    }

    /// Loads the private key from a PEM file.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            AuthError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }
}

impl EnvelopeDecrypter for RsaOaepDecrypter {
    fn decrypt(&self, envelope: &str) -> Result<Vec<u8>, String> {
        let parts: Vec<&str> = envelope.split('.').collect();
        let [header_b64, key_b64, iv_b64, ciphertext_b64, tag_b64] = parts[..] else {
            return Err(format!("envelope has {} segments, expected 5", parts.len()));
        };

        JweHeader::parse(envelope)
            .and_then(|header| header.require_expected_algorithms())
            .map_err(|e| e.to_string())?;

        let decode = |segment: &str, what: &str| {
            URL_SAFE_NO_PAD
                .decode(segment)
                .map_err(|e| format!("{what} is not base64url: {e}"))
        };
        let encrypted_key = decode(key_b64, "encrypted key")?;
        let iv = decode(iv_b64, "iv")?;
        let mut ciphertext = decode(ciphertext_b64, "ciphertext")?;
        let tag = decode(tag_b64, "tag")?;

        if iv.len() != 12 {
            return Err(format!("iv must be 12 bytes, got {}", iv.len()));
        }
        if tag.len() != 16 {
            return Err(format!("tag must be 16 bytes, got {}", tag.len()));
        }

        let cek = self
            .key
            .decrypt(Oaep::new::<Sha256>(), &encrypted_key)
            .map_err(|e| format!("key unwrap failed: {e}"))?;
        let cipher = Aes256Gcm::new_from_slice(&cek)
            .map_err(|_| format!("content key must be 32 bytes, got {}", cek.len()))?;

        ciphertext.extend_from_slice(&tag);
        cipher
            .decrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: &ciphertext,
                    aad: header_b64.as_bytes(),
                },
            )
            .map_err(|_| "content decryption failed".to_string())
    }
}

impl std::fmt::Debug for RsaOaepDecrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaOaepDecrypter").finish_non_exhaustive()
    }
}
