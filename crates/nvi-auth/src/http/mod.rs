//! Axum handlers for the OAuth endpoints.

pub mod revoke;
pub mod token;

pub use revoke::{RevocationForm, revoke_handler};
pub use token::{TokenResponse, token_handler};
