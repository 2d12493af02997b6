//! HTTP glue: identity extractors and error responses.

pub mod auth;
pub mod error;

pub use auth::{AuthState, BearerAuth, ClientTrustPath, CorroboratedIdentity};
