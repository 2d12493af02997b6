//! Leaf public key classification.

use std::fmt;

use jsonwebtoken::DecodingKey;
use x509_parser::oid_registry::{
    OID_KEY_TYPE_EC_PUBLIC_KEY, OID_PKCS1_RSAENCRYPTION, OID_SIG_ED448, OID_SIG_ED25519,
};
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

/// Public key families accepted on signing certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA (PKCS#1).
    Rsa,
    /// Elliptic curve (SEC1 point).
    Ec,
    /// Ed25519.
    Ed25519,
    /// Ed448.
    Ed448,
}

impl KeyType {
    /// Classifies a subject public key, rejecting anything outside the four
    /// accepted families.
    pub fn of(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self, String> {
        let oid = &spki.algorithm.algorithm;
        if *oid == OID_PKCS1_RSAENCRYPTION {
            Ok(Self::Rsa)
        } else if *oid == OID_KEY_TYPE_EC_PUBLIC_KEY {
            Ok(Self::Ec)
        } else if *oid == OID_SIG_ED25519 {
            Ok(Self::Ed25519)
        } else if *oid == OID_SIG_ED448 {
            Ok(Self::Ed448)
        } else {
            Err(format!("unsupported public key algorithm {oid}"))
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::Ec => write!(f, "EC"),
            Self::Ed25519 => write!(f, "Ed25519"),
            Self::Ed448 => write!(f, "Ed448"),
        }
    }
}

/// Builds a JWT decoding key from a certificate's public key.
///
/// Ed448 is an accepted certificate key type but has no JWT verifier, so it
/// can never validate a signature.
pub fn decoding_key(spki: &SubjectPublicKeyInfo<'_>) -> Result<(KeyType, DecodingKey), String> {
    let key_type = KeyType::of(spki)?;
    let key = match key_type {
        KeyType::Rsa => match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => DecodingKey::from_rsa_raw_components(rsa.modulus, rsa.exponent),
            Ok(_) => return Err("RSA key has unexpected structure".to_string()),
            Err(e) => return Err(format!("invalid RSA public key: {e}")),
        },
        KeyType::Ec => DecodingKey::from_ec_der(&spki.subject_public_key.data),
        KeyType::Ed25519 => DecodingKey::from_ed_der(&spki.subject_public_key.data),
        KeyType::Ed448 => return Err("no JWT verifier available for Ed448 keys".to_string()),
    };
    Ok((key_type, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CertificateAuthority;
    use x509_parser::parse_x509_certificate;

    #[test]
    fn test_rsa_leaf_classified() {
        let ca = CertificateAuthority::new("Key CA");
        let leaf = ca.issue_rsa("signer.example.org", 0);
        let (_, cert) = parse_x509_certificate(leaf.der()).unwrap();
        let (key_type, _) = decoding_key(cert.public_key()).unwrap();
        assert_eq!(key_type, KeyType::Rsa);
    }

    #[test]
    fn test_ec_leaf_classified() {
        let ca = CertificateAuthority::new("Key CA");
        let leaf = ca.issue_ec("signer.example.org");
        let (_, cert) = parse_x509_certificate(leaf.der()).unwrap();
        assert_eq!(KeyType::of(cert.public_key()).unwrap(), KeyType::Ec);
    }

    #[test]
    fn test_key_type_display() {
        assert_eq!(KeyType::Rsa.to_string(), "RSA");
        assert_eq!(KeyType::Ed448.to_string(), "Ed448");
    }
}
