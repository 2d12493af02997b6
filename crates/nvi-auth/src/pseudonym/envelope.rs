//! Shape of the encrypted pseudonym envelope.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::AuthResult;
use crate::error::AuthError;

/// Key management algorithm every envelope must declare.
pub const KEY_ALGORITHM: &str = "RSA-OAEP-256";

/// Content encryption algorithm every envelope must declare.
pub const CONTENT_ALGORITHM: &str = "A256GCM";

/// Prefix of the decrypted `subject`.
pub const SUBJECT_PREFIX: &str = "pseudonym:eval:";

/// The protected header of a compact JWE.
#[derive(Debug, Clone, Deserialize)]
pub struct JweHeader {
    pub alg: String,
    pub enc: String,
}

impl JweHeader {
    /// Reads the protected header of a compact JWE without decrypting it.
    ///
    /// # Errors
    ///
    /// Returns `PseudonymFormat` if the envelope does not have five
    /// segments or its header is not JSON.
    pub fn parse(envelope: &str) -> AuthResult<Self> {
        let segments = envelope.split('.').count();
        if segments != 5 {
            return Err(AuthError::pseudonym_format(format!(
                "envelope has {segments} segments, expected 5"
            )));
        }

        let header = envelope.split('.').next().unwrap_or_default();
        let bytes = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|e| AuthError::pseudonym_format(format!("envelope header: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::pseudonym_format(format!("envelope header: {e}")))
    }

    /// Rejects any algorithm pair other than `RSA-OAEP-256` + `A256GCM`.
    ///
    /// # Errors
    ///
    /// Returns `PseudonymFormat` naming the declared pair.
    pub fn require_expected_algorithms(&self) -> AuthResult<()> {
        if self.alg == KEY_ALGORITHM && self.enc == CONTENT_ALGORITHM {
            Ok(())
        } else {
            Err(AuthError::pseudonym_format(format!(
                "unsupported envelope algorithms {}/{}, expected {KEY_ALGORITHM}/{CONTENT_ALGORITHM}",
                self.alg, self.enc
            )))
        }
    }
}

/// Decrypted envelope payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PseudonymEnvelope {
    pub subject: String,
}

impl PseudonymEnvelope {
    /// Parses the decrypted JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `PseudonymFormat` if it is not an object with a string
    /// `subject`.
    pub fn from_plaintext(plaintext: &[u8]) -> AuthResult<Self> {
        serde_json::from_slice(plaintext)
            .map_err(|e| AuthError::pseudonym_format(format!("envelope payload: {e}")))
    }

    /// The blinded evaluation input carried in `subject`.
    ///
    /// # Errors
    ///
    /// Returns `PseudonymFormat` if `subject` lacks the
    /// `pseudonym:eval:` prefix or the remainder is not non-empty base64url.
    pub fn blinded_input(&self) -> AuthResult<Vec<u8>> {
        let payload = self.subject.strip_prefix(SUBJECT_PREFIX).ok_or_else(|| {
            AuthError::pseudonym_format(format!("subject must start with '{SUBJECT_PREFIX}'"))
        })?;
        decode_base64url(payload, "subject payload")
    }
}

/// Decodes non-empty base64url, tolerating trailing padding.
pub(crate) fn decode_base64url(value: &str, what: &str) -> AuthResult<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| AuthError::pseudonym_format(format!("{what} is not base64url: {e}")))?;
    if bytes.is_empty() {
        return Err(AuthError::pseudonym_format(format!("{what} is empty")));
    }
    Ok(bytes)
}
