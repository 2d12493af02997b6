//! Error response handling.
//!
//! Every `AuthError` becomes an OAuth-style JSON body
//! `{"error": ..., "error_description": ...}`. 401 responses also carry a
//! `WWW-Authenticate` challenge.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.oauth_error_code();
        let description = self.description();

        if self.is_server_error() {
            tracing::error!(error = %self, "Identity core failure");
        } else {
            tracing::debug!(error = %self, category = %self.category(), "Request rejected");
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if status == StatusCode::UNAUTHORIZED {
            let challenge = build_www_authenticate_header(error, &description);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        let body = json!({
            "error": error,
            "error_description": description,
        });
        (status, headers, Json(body)).into_response()
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="nvi", error="invalid_token", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped = description.replace('\\', "\\\\").replace('"', "\\\"");
    format!("Bearer realm=\"nvi\", error=\"{error}\", error_description=\"{escaped}\"")
}
