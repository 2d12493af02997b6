//! Storage traits for identity data.
//!
//! Two structures are shared across concurrent requests: the replay cache and
//! the issued-token table. Both are injected as trait objects so the same
//! logic runs single-instance (in memory) or clustered (PostgreSQL).
//!
//! # Implementations
//!
//! - [`memory`] - process-local storage backed by `dashmap`
//! - `nvi-auth-postgres` - PostgreSQL storage backend

pub mod issued_token;
pub mod jti;
pub mod memory;

pub use issued_token::IssuedTokenStorage;
pub use jti::JtiStorage;
pub use memory::{InMemoryIssuedTokenStorage, InMemoryJtiStorage};
