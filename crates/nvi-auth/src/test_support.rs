//! Certificate and key fixtures shared by the unit tests.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, Validation};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose,
};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use serde::Serialize;

use crate::certificate::{TrustStore, TrustedCertificateAuthority};

/// A pre-generated RSA key. Generation is slow, so tests share these.
pub struct RsaFixture {
    pub private_key: RsaPrivateKey,
    pub pkcs8_pem: String,
    pub pkcs1_pem: String,
}

static RSA_KEYS: LazyLock<Vec<RsaFixture>> = LazyLock::new(|| {
    (0..2)
        .map(|_| {
            let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
            let pkcs8_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
            let pkcs1_pem = private_key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string();
            RsaFixture {
                private_key,
                pkcs8_pem,
                pkcs1_pem,
            }
        })
        .collect()
});

/// Returns one of the shared RSA keys.
pub fn rsa_key(index: usize) -> &'static RsaFixture {
    &RSA_KEYS[index]
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Validation that checks the RS256 signature and nothing else.
pub fn signature_only_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_required_spec_claims::<&str>(&[]);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation
}

/// A throwaway ECDSA P-256 certificate authority.
pub struct CertificateAuthority {
    cert: Certificate,
    key: KeyPair,
}

impl CertificateAuthority {
    pub fn new(common_name: &str) -> Self {
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn der(&self) -> &[u8] {
        self.cert.der()
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn x5c(&self) -> String {
        STANDARD.encode(self.der())
    }

    pub fn authority(&self) -> TrustedCertificateAuthority {
        TrustedCertificateAuthority::from_der(self.der()).unwrap()
    }

    pub fn trust_store(&self) -> TrustStore {
        TrustStore::new(vec![self.authority()])
    }

    /// Issues a leaf carrying the shared RSA key `key_index`.
    pub fn issue_rsa(&self, common_name: &str, key_index: usize) -> IssuedCertificate {
        let fixture = rsa_key(key_index);
        let key = KeyPair::from_pem_and_sign_algo(&fixture.pkcs8_pem, &rcgen::PKCS_RSA_SHA256).unwrap();
        let encoding_key = EncodingKey::from_rsa_pem(fixture.pkcs1_pem.as_bytes()).unwrap();
        self.issue(common_name, &key, encoding_key, Algorithm::RS256)
    }

    /// Issues a leaf with a fresh ECDSA P-256 key.
    pub fn issue_ec(&self, common_name: &str) -> IssuedCertificate {
        let key = KeyPair::generate().unwrap();
        let encoding_key = EncodingKey::from_ec_pem(key.serialize_pem().as_bytes()).unwrap();
        self.issue(common_name, &key, encoding_key, Algorithm::ES256)
    }

    fn issue(
        &self,
        common_name: &str,
        key: &KeyPair,
        encoding_key: EncodingKey,
        algorithm: Algorithm,
    ) -> IssuedCertificate {
        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

        let cert = params.signed_by(key, &self.cert, &self.key).unwrap();
        IssuedCertificate {
            der: cert.der().to_vec(),
            pem: cert.pem(),
            encoding_key,
            algorithm,
        }
    }
}

/// A leaf certificate together with its signing key.
pub struct IssuedCertificate {
    der: Vec<u8>,
    pem: String,
    encoding_key: EncodingKey,
    algorithm: Algorithm,
}

impl IssuedCertificate {
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn pem(&self) -> String {
        self.pem.clone()
    }

    pub fn x5c(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// Signs `claims` with the leaf key. `customize` edits the JOSE header.
    pub fn sign_jwt<T: Serialize>(&self, claims: &T, customize: impl FnOnce(&mut Header)) -> String {
        let mut header = Header::new(self.algorithm);
        customize(&mut header);
        jsonwebtoken::encode(&header, claims, &self.encoding_key).unwrap()
    }
}

/// Encrypts `plaintext` as a compact JWE for the shared RSA key `key_index`,
/// declaring `alg`/`enc` in the protected header.
pub fn encrypt_envelope(plaintext: &[u8], key_index: usize, alg: &str, enc: &str) -> String {
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use rand::RngCore;
    use rsa::{Oaep, RsaPublicKey};

    let mut rng = rand::rngs::OsRng;
    let mut cek = [0u8; 32];
    let mut iv = [0u8; 12];
    rng.fill_bytes(&mut cek);
    rng.fill_bytes(&mut iv);

    let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"{alg}","enc":"{enc}"}}"#));
    let public_key = RsaPublicKey::from(&rsa_key(key_index).private_key);
    let encrypted_key = public_key
        .encrypt(&mut rng, Oaep::new::<sha2::Sha256>(), &cek)
        .unwrap();

    let cipher = Aes256Gcm::new_from_slice(&cek).unwrap();
    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: header.as_bytes(),
            },
        )
        .unwrap();
    let tag = sealed.split_off(sealed.len() - 16);

    format!(
        "{header}.{}.{}.{}.{}",
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(sealed),
        URL_SAFE_NO_PAD.encode(tag)
    )
}
