//! Domain types shared by the identity core and its storage backends.

pub mod issued_token;

pub use issued_token::IssuedToken;
