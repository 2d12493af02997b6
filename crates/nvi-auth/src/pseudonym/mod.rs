//! Pseudonym exchange.
//!
//! A caller sends an encrypted envelope whose `subject` carries an
//! OPRF-blinded evaluation, plus its own blind factor. The exchanger decrypts
//! the envelope, unblinds the evaluation and returns the result as a
//! base64url pseudonym. The underlying identifier is never visible here.
//!
//! Identical `(subject, blind_factor)` pairs always produce the identical
//! pseudonym, since later lookups compare pseudonyms by exact equality.

pub mod decrypt;
pub mod envelope;
pub mod oprf;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

pub use decrypt::{EnvelopeDecrypter, RsaOaepDecrypter};
pub use envelope::{JweHeader, PseudonymEnvelope};
pub use oprf::OprfUnblinder;

use crate::AuthResult;
use crate::error::AuthError;
use envelope::decode_base64url;

/// Turns encrypted blinded envelopes into stable pseudonyms.
#[derive(Clone)]
pub struct PseudonymExchanger {
    decrypter: Arc<dyn EnvelopeDecrypter>,
    unblinder: Arc<dyn OprfUnblinder>,
}

impl PseudonymExchanger {
    /// Creates an exchanger over injected cryptographic capabilities.
    #[must_use]
    pub fn new(decrypter: Arc<dyn EnvelopeDecrypter>, unblinder: Arc<dyn OprfUnblinder>) -> Self {
        Self {
            decrypter,
            unblinder,
        }
    }

    /// Exchanges `envelope` for a pseudonym using the caller's base64url
    /// `blind_factor`.
    ///
    /// # Errors
    ///
    /// Returns `PseudonymFormat` for a wrong algorithm pair, payload,
    /// subject or blind factor, and `PseudonymPrimitive` when decryption or
    /// the unblind step fails. No partial pseudonym is ever returned.
    pub fn exchange(&self, envelope: &str, blind_factor: &str) -> AuthResult<String> {
        JweHeader::parse(envelope)?.require_expected_algorithms()?;

        let plaintext = self
            .decrypter
            .decrypt(envelope)
            .map_err(|e| AuthError::pseudonym_primitive(format!("envelope decryption: {e}")))?;
        let blinded = PseudonymEnvelope::from_plaintext(&plaintext)?.blinded_input()?;
        let blind_factor = decode_base64url(blind_factor, "blind factor")?;

        let evaluated = self
            .unblinder
            .unblind(&blinded, &blind_factor)
            .map_err(|e| AuthError::pseudonym_primitive(format!("unblind: {e}")))?;
        if evaluated.is_empty() {
            return Err(AuthError::pseudonym_primitive("unblind produced no output"));
        }

        Ok(URL_SAFE_NO_PAD.encode(evaluated))
    }
}

impl std::fmt::Debug for PseudonymExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudonymExchanger").finish_non_exhaustive()
    }
}
