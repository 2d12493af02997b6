//! Certificate fixtures and server bootstrap shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use nvi_server::{AppConfig, build_app};
use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const TOKEN_URL: &str = "https://nvi.test/oauth/token";

pub struct Authority {
    cert: Certificate,
    key: KeyPair,
}

impl Authority {
    pub fn new(common_name: &str) -> Self {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Base64 DER, as carried in an `x5c` header.
    pub fn x5c(&self) -> String {
        STANDARD.encode(self.cert.der())
    }

    fn sign_leaf(&self, common_name: &str, key: &KeyPair) -> Certificate {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.signed_by(key, &self.cert, &self.key).unwrap()
    }

    /// A transport (mTLS) certificate.
    pub fn issue_transport(&self, common_name: &str) -> Transport {
        let key = KeyPair::generate().unwrap();
        let cert = self.sign_leaf(common_name, &key);
        Transport {
            der: cert.der().to_vec(),
            pem: cert.pem(),
        }
    }

    /// An RSA assertion signing certificate.
    pub fn issue_signer(&self, common_name: &str) -> Signer {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let pkcs8 = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let pkcs1 = private_key.to_pkcs1_pem(LineEnding::LF).unwrap();
        let key = KeyPair::from_pem_and_sign_algo(&pkcs8, &rcgen::PKCS_RSA_SHA256).unwrap();
        let cert = self.sign_leaf(common_name, &key);
        Signer {
            der: cert.der().to_vec(),
            pem: cert.pem(),
            encoding_key: EncodingKey::from_rsa_pem(pkcs1.as_bytes()).unwrap(),
        }
    }
}

pub struct Transport {
    der: Vec<u8>,
    pem: String,
}

impl Transport {
    /// The PEM flattened onto one line, as proxies forward it in a header.
    pub fn header_value(&self) -> String {
        self.pem.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// `cnf.x5t#S256` value binding an assertion to this certificate.
    pub fn thumbprint(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(&self.der))
    }
}

pub struct Signer {
    der: Vec<u8>,
    pem: String,
    encoding_key: EncodingKey,
}

impl Signer {
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Base64 DER, as carried in an `x5c` header.
    pub fn x5c(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// Signs `claims` as RS256 after `customize` has adjusted the header.
    pub fn sign(&self, claims: &serde_json::Value, customize: impl FnOnce(&mut Header)) -> String {
        let mut header = Header::new(Algorithm::RS256);
        customize(&mut header);
        jsonwebtoken::encode(&header, claims, &self.encoding_key).unwrap()
    }

    /// Signs a client assertion carrying this certificate in `x5c`.
    pub fn assertion(&self, claims: &serde_json::Value) -> String {
        self.sign(claims, |header| header.x5c = Some(vec![self.x5c()]))
    }
}

/// The PKI a test server trusts, written to a temporary directory.
pub struct Pki {
    pub dir: TempDir,
    pub assertion_ca: Authority,
    pub direct_ca: Authority,
    pub oauth_ca: Authority,
}

impl Pki {
    pub fn new() -> Self {
        let pki = Self {
            dir: tempfile::tempdir().unwrap(),
            assertion_ca: Authority::new("NVI Assertion CA"),
            direct_ca: Authority::new("NVI Direct CA"),
            oauth_ca: Authority::new("NVI OAuth CA"),
        };
        std::fs::write(pki.path("assertion-ca.pem"), pki.assertion_ca.pem()).unwrap();
        std::fs::write(pki.path("direct-ca.pem"), pki.direct_ca.pem()).unwrap();
        std::fs::write(pki.path("oauth-ca.pem"), pki.oauth_ca.pem()).unwrap();
        pki
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.auth.trust.client_assertion_ca = Some(self.path("assertion-ca.pem"));
        cfg.auth.trust.direct_certificate_ca = Some(self.path("direct-ca.pem"));
        cfg.auth.trust.oauth_certificate_ca = Some(self.path("oauth-ca.pem"));
        cfg
    }
}

pub fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Claims of a well-formed assertion bound to `transport`.
pub fn assertion_claims(transport: &Transport) -> serde_json::Value {
    serde_json::json!({
        "iss": "client.example.org",
        "sub": "client.example.org",
        "aud": TOKEN_URL,
        "iat": now(),
        "exp": now() + 60,
        "jti": uuid::Uuid::new_v4().to_string(),
        "cnf": { "x5t#S256": transport.thumbprint() },
    })
}

pub async fn start_server(
    cfg: &AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(cfg).await.expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}
