//! Nested identity assertions.
//!
//! An outer assertion (LRS token) is signed by a certificate carried in its
//! own `x5c` header. It embeds a second assertion (DEZI token) signed by a
//! third party from the [`SigningCertificateRegistry`]. The embedded
//! `relations` must name the caller's independently established identity.
//!
//! [`SigningCertificateRegistry`]: crate::certificate::SigningCertificateRegistry

pub mod claims;
pub mod validator;

pub use claims::{EmbeddedClaims, Relation, VerifiedOuterClaims};
pub use validator::NestedTokenValidator;
