//! PostgreSQL storage backend for NVI Auth
//!
//! Provides persistent storage for:
//!
//! - Issued opaque access tokens (hashes only)
//! - Used client assertion JTIs (replay protection)
//!
//! Tables are created by [`schema::ensure_schema`] at boot if missing.
//!
//! # Example
//!
//! ```ignore
//! use nvi_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/nvi", 10).await?;
//! storage.ensure_schema().await?;
//!
//! let tokens = storage.issued_token_storage();
//! let jtis = storage.jti_storage();
//! ```

pub mod issued_token;
pub mod schema;
pub mod storage_adapters;
pub mod used_jti;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use issued_token::IssuedTokenStore;
pub use storage_adapters::{ArcIssuedTokenStorage, ArcJtiStorage};
pub use used_jti::UsedJtiStore;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Resource already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl StorageError {
    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<StorageError> for nvi_auth::AuthError {
    fn from(error: StorageError) -> Self {
        nvi_auth::AuthError::storage(error.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for identity core state.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates the tables this backend needs if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        schema::ensure_schema(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Issued token storage usable as `Arc<dyn IssuedTokenStorage>`.
    #[must_use]
    pub fn issued_token_storage(&self) -> ArcIssuedTokenStorage {
        ArcIssuedTokenStorage::new(Arc::clone(&self.pool))
    }

    /// JTI storage usable as `Arc<dyn JtiStorage>`.
    #[must_use]
    pub fn jti_storage(&self) -> ArcJtiStorage {
        ArcJtiStorage::new(Arc::clone(&self.pool))
    }
}
