//! Unverified JOSE header helpers.
//!
//! Nothing here checks a signature. These functions only read the header so
//! the caller can pick the key that will.

use jsonwebtoken::Header;

/// Returns `true` if `token` has the shape of a compact JWS: three
/// dot-separated, non-empty base64url segments.
#[must_use]
pub fn is_compact_jws(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

/// Decodes the protected header without verifying the token.
///
/// # Errors
///
/// Returns a description if the token is not a compact JWS or the header is
/// not valid JSON.
pub fn decode_header(token: &str) -> Result<Header, String> {
    if !is_compact_jws(token) {
        return Err("token is not a compact JWS".to_string());
    }
    jsonwebtoken::decode_header(token).map_err(|e| format!("invalid token header: {e}"))
}

/// Returns the `x5c` chain of a header.
///
/// # Errors
///
/// Returns a description if the header has no `x5c` or it is empty.
pub fn x5c(header: &Header) -> Result<&[String], String> {
    match header.x5c.as_deref() {
        Some(chain) if !chain.is_empty() => Ok(chain),
        Some(_) => Err("x5c header is empty".to_string()),
        None => Err("x5c header is missing".to_string()),
    }
}

/// Returns the `x5t#S256` thumbprint named by a header, if any.
///
/// Signer registries are keyed by base64url SHA-256 thumbprints only. A SHA-1
/// `x5t` or a free-form `kid` cannot name a registry entry, so neither is
/// returned here and such tokens go through the scan.
#[must_use]
pub fn thumbprint_hint(header: &Header) -> Option<&str> {
    header.x5t_s256.as_deref().filter(|hint| !hint.is_empty())
}
