//! Token revocation endpoint (`POST /oauth/revoke`).
//!
//! Revocation addresses tokens by their SHA-256 hash, so the plaintext never
//! has to travel again. The caller must itself hold a valid bearer token and
//! may only revoke tokens issued to the same owner identity.

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::AuthError;
use crate::middleware::{AuthState, BearerAuth};

/// Form parameters for the revocation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RevocationForm {
    /// Hex SHA-256 of the token to revoke.
    #[serde(default)]
    pub token_hash: String,
}

/// Revokes a token by hash. Responds 200 on success and 404 for unknown
/// hashes and for tokens of other owners.
pub async fn revoke_handler(
    State(state): State<AuthState>,
    BearerAuth(caller): BearerAuth,
    Form(form): Form<RevocationForm>,
) -> Response {
    let token_hash = form.token_hash.trim();
    if token_hash.is_empty() {
        return AuthError::invalid_request("token_hash is required").into_response();
    }

    match state
        .issuer
        .revoke_owned(&caller.owner_identity, token_hash)
        .await
    {
        Ok(()) => {
            tracing::info!(revoked_by = %caller.owner_identity, "Token revocation accepted");
            StatusCode::OK.into_response()
        }
        Err(e) => e.into_response(),
    }
}
