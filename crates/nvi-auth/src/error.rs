//! Identity and pseudonym error types.
//!
//! Every failure produced by this crate is one [`AuthError`]. Low-level decode,
//! parse and primitive errors are folded into one of the taxonomy members
//! before they leave a component, so callers never see a raw parser error.
//!
//! Each variant maps onto an OAuth-style triple: a machine `error` code, a
//! human description and an HTTP status (see [`AuthError::oauth_error_code`]
//! and [`AuthError::status_code`]).

use std::fmt;

use axum::http::StatusCode;

/// Errors that can occur while establishing caller identity or exchanging
/// pseudonyms.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The presented certificate chain is not issued by a trusted authority.
    #[error("Certificate not trusted: {message}")]
    CertificateTrust {
        /// The underlying cause (decode failure, issuer mismatch, bad signature).
        message: String,
    },

    /// A token is missing claims or carries invalid, expired or wrong-audience claims.
    #[error("Invalid token claims: {message}")]
    TokenClaims {
        /// Description of the offending claim.
        message: String,
    },

    /// The `jti` of a single-use assertion was already presented.
    #[error("Assertion jti already used: {jti}")]
    Replay {
        /// The reused JWT id.
        jti: String,
    },

    /// The token is not bound to the certificate presented over mutual TLS.
    #[error("Proof of possession failed: {message}")]
    ProofOfPossession {
        /// Description of the binding mismatch.
        message: String,
    },

    /// The pseudonym envelope or its subject has the wrong shape.
    #[error("Malformed pseudonym: {message}")]
    PseudonymFormat {
        /// Description of the malformed part.
        message: String,
    },

    /// Decryption or the unblind primitive failed.
    #[error("Pseudonym exchange failed: {message}")]
    PseudonymPrimitive {
        /// Description of the failing step.
        message: String,
    },

    /// The outer identity assertion or its embedded assertion is invalid.
    #[error("Nested token validation failed: {message}")]
    NestedTokenValidation {
        /// Description of the failing check.
        message: String,
    },

    /// The client could not be authenticated.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The request is missing a parameter or has the wrong shape.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// A requested scope is not in the allowed set.
    #[error("Invalid scope: {scope}")]
    InvalidScope {
        /// The rejected scope.
        scope: String,
    },

    /// Only the client credentials grant is supported.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The request lacks credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The bearer token is unknown or malformed.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The bearer token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The bearer token has been explicitly revoked.
    #[error("Token revoked")]
    TokenRevoked,

    /// The addressed record does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// An error occurred while storing or retrieving data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration is invalid or a trust anchor could not be loaded.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `CertificateTrust` error.
    #[must_use]
    pub fn certificate_trust(message: impl Into<String>) -> Self {
        Self::CertificateTrust {
            message: message.into(),
        }
    }

    /// Creates a new `TokenClaims` error.
    #[must_use]
    pub fn token_claims(message: impl Into<String>) -> Self {
        Self::TokenClaims {
            message: message.into(),
        }
    }

    /// Creates a new `Replay` error.
    #[must_use]
    pub fn replay(jti: impl Into<String>) -> Self {
        Self::Replay { jti: jti.into() }
    }

    /// Creates a new `ProofOfPossession` error.
    #[must_use]
    pub fn proof_of_possession(message: impl Into<String>) -> Self {
        Self::ProofOfPossession {
            message: message.into(),
        }
    }

    /// Creates a new `PseudonymFormat` error.
    #[must_use]
    pub fn pseudonym_format(message: impl Into<String>) -> Self {
        Self::PseudonymFormat {
            message: message.into(),
        }
    }

    /// Creates a new `PseudonymPrimitive` error.
    #[must_use]
    pub fn pseudonym_primitive(message: impl Into<String>) -> Self {
        Self::PseudonymPrimitive {
            message: message.into(),
        }
    }

    /// Creates a new `NestedTokenValidation` error.
    #[must_use]
    pub fn nested_token(message: impl Into<String>) -> Self {
        Self::NestedTokenValidation {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(scope: impl Into<String>) -> Self {
        Self::InvalidScope {
            scope: scope.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns the error category for audit logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CertificateTrust { .. }
            | Self::InvalidClient { .. }
            | Self::Unauthorized { .. }
            | Self::ProofOfPossession { .. }
            | Self::NestedTokenValidation { .. } => ErrorCategory::Authentication,
            Self::TokenClaims { .. }
            | Self::Replay { .. }
            | Self::InvalidToken { .. }
            | Self::TokenExpired
            | Self::TokenRevoked => ErrorCategory::Token,
            Self::PseudonymFormat { .. } | Self::PseudonymPrimitive { .. } => {
                ErrorCategory::Pseudonym
            }
            Self::InvalidRequest { .. }
            | Self::InvalidScope { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::NotFound { .. } => ErrorCategory::Validation,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the machine-readable error code sent in the `error` field.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::CertificateTrust { .. }
            | Self::InvalidClient { .. }
            | Self::ProofOfPossession { .. }
            | Self::Replay { .. }
            | Self::TokenClaims { .. } => "invalid_client",
            Self::NestedTokenValidation { .. } => "invalid_grant",
            Self::InvalidRequest { .. }
            | Self::PseudonymFormat { .. }
            | Self::PseudonymPrimitive { .. } => "invalid_request",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidToken { .. } | Self::TokenExpired | Self::TokenRevoked => "invalid_token",
            Self::NotFound { .. } => "not_found",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Returns the HTTP status this error surfaces as.
    ///
    /// Identity and token failures are 401, malformed requests 400 and
    /// unknown revocation targets 404.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CertificateTrust { .. }
            | Self::TokenClaims { .. }
            | Self::Replay { .. }
            | Self::ProofOfPossession { .. }
            | Self::NestedTokenValidation { .. }
            | Self::InvalidClient { .. }
            | Self::Unauthorized { .. }
            | Self::InvalidToken { .. }
            | Self::TokenExpired
            | Self::TokenRevoked => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest { .. }
            | Self::InvalidScope { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::PseudonymFormat { .. } => StatusCode::BAD_REQUEST,
            Self::PseudonymPrimitive { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the human-readable description sent in `error_description`.
    ///
    /// Server errors are not echoed to the caller.
    #[must_use]
    pub fn description(&self) -> String {
        if self.is_server_error() {
            "The server encountered an internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Categories of identity errors for audit logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller identity could not be established.
    Authentication,
    /// Bearer token or assertion claims problems.
    Token,
    /// Pseudonym envelope or primitive problems.
    Pseudonym,
    /// Request shape problems.
    Validation,
    /// Storage or database problems.
    Infrastructure,
    /// Configuration problems.
    Configuration,
    /// Unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::Pseudonym => write!(f, "pseudonym"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
