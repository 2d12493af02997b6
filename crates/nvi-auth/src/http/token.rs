//! OAuth 2.0 token endpoint (`POST /oauth/token`).
//!
//! ```text
//! POST /oauth/token
//! Content-Type: application/x-www-form-urlencoded
//! x-ssl-client-cert: <PEM>
//! x-ssl-client-verify: SUCCESS
//!
//! grant_type=client_credentials
//! &scope=referral:read
//! &client_assertion_type=urn:ietf:params:oauth:client-assertion-type:jwt-bearer
//! &client_assertion=<JWT>
//! ```

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, Uri, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::middleware::AuthState;
use crate::oauth::{RequestContext, TokenRequest};

/// Successful token response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    pub scope: String,
}

/// Validates the client assertion and issues an opaque bearer token.
pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    uri: Uri,
    Form(request): Form<TokenRequest>,
) -> Response {
    match issue(&state, &headers, &uri, &request).await {
        Ok(response) => (
            [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
            Json(response),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, grant_type = %request.grant_type, "Token request rejected");
            e.into_response()
        }
    }
}

async fn issue(
    state: &AuthState,
    headers: &HeaderMap,
    uri: &Uri,
    request: &TokenRequest,
) -> Result<TokenResponse, AuthError> {
    let issuer = &state.issuer;
    let context = RequestContext::from_request(headers, uri, issuer.mtls_config());

    let verified = issuer.validate(request, &context).await?;
    let access_token = issuer
        .generate_token(&verified.subject, &verified.scopes)
        .await?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: issuer.access_token_lifetime().as_secs(),
        scope: verified.scopes.join(" "),
    })
}
