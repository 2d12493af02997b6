//! Registry of trusted third-party assertion signers.
//!
//! The registry is loaded once at boot and read without locking afterwards.
//! Signer lookup is a two-phase algorithm:
//!
//! 1. **Indexed**: when the token header names a thumbprint, only the entry
//!    registered under exactly that thumbprint is tried. An unknown
//!    thumbprint fails immediately, there is no fallback.
//! 2. **Scanned**: without a thumbprint every entry is tried in load order
//!    and the first one whose key verifies the signature wins.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use jsonwebtoken::{DecodingKey, TokenData, Validation};
use serde::de::DeserializeOwned;
use x509_parser::parse_x509_certificate;

use super::key::{KeyType, decoding_key};
use super::{parse_certificates, sha256_thumbprint};
use crate::AuthResult;
use crate::error::AuthError;

/// A trusted signer certificate with its extracted key.
#[derive(Clone)]
pub struct SigningCertificateEntry {
    certificate: Vec<u8>,
    public_key: DecodingKey,
    key_type: KeyType,
    thumbprint: String,
    subject: String,
}

impl SigningCertificateEntry {
    /// Creates an entry indexed by the certificate's `x5t#S256` thumbprint.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the certificate or its key is unusable.
    pub fn from_der(certificate: impl Into<Vec<u8>>) -> AuthResult<Self> {
        let certificate = certificate.into();
        let thumbprint = sha256_thumbprint(&certificate);
        Self::with_thumbprint(certificate, thumbprint)
    }

    /// Creates an entry indexed by an explicit thumbprint.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the certificate or its key is unusable.
    pub fn with_thumbprint(
        certificate: impl Into<Vec<u8>>,
        thumbprint: impl Into<String>,
    ) -> AuthResult<Self> {
        let certificate = certificate.into();
        let (key_type, public_key, subject) = {
            let (_, cert) = parse_x509_certificate(&certificate).map_err(|e| {
                AuthError::configuration(format!("invalid signer certificate: {e}"))
            })?;
            let (key_type, public_key) = decoding_key(cert.public_key())
                .map_err(|e| AuthError::configuration(format!("unusable signer key: {e}")))?;
            (key_type, public_key, cert.subject().to_string())
        };

        Ok(Self {
            certificate,
            public_key,
            key_type,
            thumbprint: thumbprint.into(),
            subject,
        })
    }

    /// The DER encoding of the signer certificate.
    #[must_use]
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// The verification key.
    #[must_use]
    pub fn public_key(&self) -> &DecodingKey {
        &self.public_key
    }

    /// The key family of the signer.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// The thumbprint this entry is indexed under.
    #[must_use]
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// The signer subject in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl fmt::Debug for SigningCertificateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCertificateEntry")
            .field("thumbprint", &self.thumbprint)
            .field("subject", &self.subject)
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

/// How the signer of a token was located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerLookup {
    /// Found through the thumbprint named in the token header.
    Indexed {
        /// Thumbprint of the matching entry.
        thumbprint: String,
    },
    /// Found by trying every registered key.
    Scanned {
        /// Thumbprint of the first entry that verified.
        thumbprint: String,
    },
}

impl SignerLookup {
    /// Thumbprint of the entry that verified the token.
    #[must_use]
    pub fn thumbprint(&self) -> &str {
        match self {
            Self::Indexed { thumbprint } | Self::Scanned { thumbprint } => thumbprint,
        }
    }
}

/// Immutable set of trusted signer certificates.
#[derive(Debug, Default)]
pub struct SigningCertificateRegistry {
    entries: Vec<SigningCertificateEntry>,
    by_thumbprint: HashMap<String, usize>,
}

impl SigningCertificateRegistry {
    /// Builds a registry. The first entry registered under a thumbprint wins.
    #[must_use]
    pub fn new(entries: Vec<SigningCertificateEntry>) -> Self {
        let mut by_thumbprint = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if by_thumbprint.contains_key(entry.thumbprint()) {
                tracing::warn!(
                    thumbprint = %entry.thumbprint(),
                    subject = %entry.subject(),
                    "Duplicate signer thumbprint ignored"
                );
                continue;
            }
            by_thumbprint.insert(entry.thumbprint().to_string(), index);
        }

        Self {
            entries,
            by_thumbprint,
        }
    }

    /// Loads every certificate file (`.pem`, `.crt`, `.cer`, `.der`) in a
    /// directory, in file name order.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the directory or any file cannot be read.
    pub fn load_dir(dir: impl AsRef<Path>) -> AuthResult<Self> {
        let dir = dir.as_ref();
        let read_error =
            |e: std::io::Error| AuthError::configuration(format!("cannot read {}: {e}", dir.display()));

        let mut paths = std::fs::read_dir(dir)
            .map_err(read_error)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_error)?;
        paths.retain(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e, "pem" | "crt" | "cer" | "der"))
        });
        paths.sort();

        let mut entries = Vec::new();
        for path in &paths {
            let bytes = std::fs::read(path).map_err(|e| {
                AuthError::configuration(format!("cannot read {}: {e}", path.display()))
            })?;
            for der in parse_certificates(&bytes)? {
                entries.push(SigningCertificateEntry::from_der(der)?);
            }
        }

        tracing::info!(
            dir = %dir.display(),
            signers = entries.len(),
            "Loaded signing certificate registry"
        );
        Ok(Self::new(entries))
    }

    /// Number of registered signers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no signer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry by exact thumbprint.
    #[must_use]
    pub fn get(&self, thumbprint: &str) -> Option<&SigningCertificateEntry> {
        self.by_thumbprint
            .get(thumbprint)
            .map(|&index| &self.entries[index])
    }

    /// Iterates the entries in load order.
    pub fn entries(&self) -> impl Iterator<Item = &SigningCertificateEntry> {
        self.entries.iter()
    }

    /// Verifies `token` against the registered signers.
    ///
    /// `thumbprint` selects the indexed path; `None` selects the scan.
    ///
    /// # Errors
    ///
    /// Returns `CertificateTrust` if the thumbprint is unknown, the indexed
    /// signer does not verify the token, or no signer verifies it.
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        thumbprint: Option<&str>,
        validation: &Validation,
    ) -> AuthResult<(TokenData<T>, SignerLookup)> {
        match thumbprint {
            Some(thumbprint) => self.verify_indexed(token, thumbprint, validation),
            None => self.verify_scanned(token, validation),
        }
    }

    fn verify_indexed<T: DeserializeOwned>(
        &self,
        token: &str,
        thumbprint: &str,
        validation: &Validation,
    ) -> AuthResult<(TokenData<T>, SignerLookup)> {
        let entry = self.get(thumbprint).ok_or_else(|| {
            AuthError::certificate_trust(format!("no signer registered for thumbprint '{thumbprint}'"))
        })?;

        let data = jsonwebtoken::decode::<T>(token, entry.public_key(), validation).map_err(|e| {
            AuthError::certificate_trust(format!(
                "signature does not verify with signer '{thumbprint}': {e}"
            ))
        })?;

        Ok((
            data,
            SignerLookup::Indexed {
                thumbprint: entry.thumbprint().to_string(),
            },
        ))
    }

    fn verify_scanned<T: DeserializeOwned>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> AuthResult<(TokenData<T>, SignerLookup)> {
        for entry in &self.entries {
            match jsonwebtoken::decode::<T>(token, entry.public_key(), validation) {
                Ok(data) => {
                    return Ok((
                        data,
                        SignerLookup::Scanned {
                            thumbprint: entry.thumbprint().to_string(),
                        },
                    ));
                }
                Err(e) => {
                    tracing::trace!(thumbprint = %entry.thumbprint(), error = %e, "Signer did not verify");
                }
            }
        }

        Err(AuthError::certificate_trust(format!(
            "none of {} registered signers verifies the token",
            self.entries.len()
        )))
    }
}
