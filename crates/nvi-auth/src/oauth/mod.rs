//! OAuth 2.0 client credentials over mutual TLS.
//!
//! - [`mtls`] - proxy-injected client certificate and request URL
//! - [`client_assertion`] - the individual client assertion checks
//! - [`issuer`] - token issuance, verification and revocation

pub mod client_assertion;
pub mod issuer;
pub mod mtls;

pub use client_assertion::{CLIENT_CREDENTIALS_GRANT, JWT_BEARER_ASSERTION_TYPE};
pub use issuer::{ClientCredentialIssuer, TokenRequest, VerifiedClientAssertion};
pub use mtls::{ClientCertificate, RequestContext};
