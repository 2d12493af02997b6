//! Authentication path selection from client certificate metadata.
//!
//! Two trust stores are configured independently: one whose certificates
//! identify the caller directly, and one whose certificates must go through
//! the OAuth client assertion flow. The classifier reports membership only
//! and never derives an identity.

use std::fmt;
use std::sync::Arc;

use x509_parser::parse_x509_certificate;

use crate::certificate::TrustStore;
use crate::oauth::RequestContext;

/// The authentication path a client certificate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPath {
    /// The certificate itself identifies the caller.
    DirectCertificate,
    /// The caller must obtain a bearer token with a client assertion.
    ClientAssertion,
}

impl fmt::Display for TrustPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectCertificate => write!(f, "direct_certificate"),
            Self::ClientAssertion => write!(f, "client_assertion"),
        }
    }
}

/// Decides which trust store recognizes a client certificate.
#[derive(Debug, Clone)]
pub struct TrustPathClassifier {
    direct: Arc<TrustStore>,
    oauth: Arc<TrustStore>,
    verify_success_value: String,
}

impl TrustPathClassifier {
    /// Creates a classifier over the two path-specific trust stores.
    #[must_use]
    pub fn new(
        direct: Arc<TrustStore>,
        oauth: Arc<TrustStore>,
        verify_success_value: impl Into<String>,
    ) -> Self {
        Self {
            direct,
            oauth,
            verify_success_value: verify_success_value.into(),
        }
    }

    /// Classifies the client certificate of a request.
    ///
    /// Returns `None` when the proxy did not verify a certificate, the
    /// certificate does not decode, or neither store issued it. The direct
    /// store is consulted first.
    #[must_use]
    pub fn classify(&self, context: &RequestContext) -> Option<TrustPath> {
        let certificate = match context.client_certificate(&self.verify_success_value) {
            Ok(certificate) => certificate,
            Err(e) => {
                tracing::debug!(error = %e, "No usable client certificate");
                return None;
            }
        };
        self.classify_der(certificate.der())
    }

    /// Classifies a DER certificate.
    #[must_use]
    pub fn classify_der(&self, der: &[u8]) -> Option<TrustPath> {
        let (_, certificate) = parse_x509_certificate(der).ok()?;

        let path = if self.direct.verify_issued(&certificate).is_ok() {
            Some(TrustPath::DirectCertificate)
        } else if self.oauth.verify_issued(&certificate).is_ok() {
            Some(TrustPath::ClientAssertion)
        } else {
            None
        };

        tracing::debug!(
            issuer = %certificate.issuer(),
            path = ?path,
            "Client certificate classified"
        );
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CertificateAuthority;

    struct Fixture {
        direct: CertificateAuthority,
        oauth: CertificateAuthority,
        classifier: TrustPathClassifier,
    }

    fn fixture() -> Fixture {
        let direct = CertificateAuthority::new("Direct CA");
        let oauth = CertificateAuthority::new("OAuth CA");
        let classifier = TrustPathClassifier::new(
            Arc::new(direct.trust_store()),
            Arc::new(oauth.trust_store()),
            "SUCCESS",
        );
        Fixture {
            direct,
            oauth,
            classifier,
        }
    }

    fn context(pem: String, verify: &str) -> RequestContext {
        RequestContext::new("https://nvi.example.org/referrals").with_client_certificate(pem, verify)
    }

    #[test]
    fn test_classifies_each_path() {
        let f = fixture();
        let direct = f.direct.issue_ec("org.example.org");
        let oauth = f.oauth.issue_ec("client.example.org");

        assert_eq!(
            f.classifier.classify(&context(direct.pem(), "SUCCESS")),
            Some(TrustPath::DirectCertificate)
        );
        assert_eq!(
            f.classifier.classify(&context(oauth.pem(), "SUCCESS")),
            Some(TrustPath::ClientAssertion)
        );
    }

    #[test]
    fn test_unknown_issuer_has_no_path() {
        let f = fixture();
        let other = CertificateAuthority::new("Other CA").issue_ec("x.example.org");
        assert_eq!(f.classifier.classify(&context(other.pem(), "SUCCESS")), None);
    }

    #[test]
    fn test_unverified_certificate_has_no_path() {
        let f = fixture();
        let direct = f.direct.issue_ec("org.example.org");
        assert_eq!(f.classifier.classify(&context(direct.pem(), "NONE")), None);
        assert_eq!(
            f.classifier
                .classify(&RequestContext::new("https://nvi.example.org/referrals")),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TrustPath::DirectCertificate.to_string(), "direct_certificate");
        assert_eq!(TrustPath::ClientAssertion.to_string(), "client_assertion");
    }
}
