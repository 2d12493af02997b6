//! JWT client assertion checks for the mTLS-bound client credentials grant.
//!
//! Each check is a free function so it can be exercised in isolation. The
//! [`ClientCredentialIssuer`] runs them in order:
//!
//! | step | check                                              | failure               |
//! |------|----------------------------------------------------|-----------------------|
//! | a    | grant type and requested scopes                    | `UnsupportedGrantType`, `InvalidScope` |
//! | b    | proxy-verified client certificate                  | `InvalidClient`       |
//! | c    | assertion type and compact JWS shape               | `InvalidRequest`      |
//! | d    | `x5c` chain against the assertion CA bundle        | `CertificateTrust`    |
//! | e    | RS256 signature, `aud` == request URL, `exp`/`iat` | `TokenClaims`         |
//! | f    | `jti`/`exp` single use                             | `TokenClaims`, `Replay` |
//! | g    | `cnf.x5t#S256` == transport fingerprint            | `ProofOfPossession`   |
//!
//! [`ClientCredentialIssuer`]: super::ClientCredentialIssuer

use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};

use crate::AuthResult;
use crate::certificate::{CertificateChainValidator, ValidatedCertificate};
use crate::error::AuthError;
use crate::jose;

/// The only grant type accepted at the token endpoint.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Client assertion type for JWT bearer client authentication (RFC 7523).
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Step a: the grant type must be `client_credentials`.
///
/// # Errors
///
/// Returns `UnsupportedGrantType` for any other value.
pub fn check_grant_type(grant_type: &str) -> AuthResult<()> {
    if grant_type == CLIENT_CREDENTIALS_GRANT {
        Ok(())
    } else {
        Err(AuthError::unsupported_grant_type(grant_type))
    }
}

/// Step a: resolves the requested space-separated scopes.
///
/// An absent or blank scope grants every allowed scope.
///
/// # Errors
///
/// Returns `InvalidScope` naming the first scope outside `allowed`.
pub fn resolve_scopes(scope: Option<&str>, allowed: &[String]) -> AuthResult<Vec<String>> {
    let requested: Vec<&str> = scope.map(|s| s.split_whitespace().collect()).unwrap_or_default();
    if requested.is_empty() {
        return Ok(allowed.to_vec());
    }

    let mut scopes: Vec<String> = Vec::with_capacity(requested.len());
    for scope in requested {
        if !allowed.iter().any(|a| a == scope) {
            return Err(AuthError::invalid_scope(scope));
        }
        if !scopes.iter().any(|s| s == scope) {
            scopes.push(scope.to_string());
        }
    }
    Ok(scopes)
}

/// Step c: the assertion type must be the JWT bearer URN and the assertion a
/// compact JWS.
///
/// # Errors
///
/// Returns `InvalidRequest` if either check fails.
pub fn check_assertion_shape(assertion_type: &str, assertion: &str) -> AuthResult<()> {
    if assertion_type != JWT_BEARER_ASSERTION_TYPE {
        return Err(AuthError::invalid_request(format!(
            "client_assertion_type must be {JWT_BEARER_ASSERTION_TYPE}"
        )));
    }
    if !jose::is_compact_jws(assertion) {
        return Err(AuthError::invalid_request(
            "client_assertion is not a signed JWT",
        ));
    }
    Ok(())
}

/// Step d: validates the assertion's own signing certificate chain.
///
/// # Errors
///
/// Returns `CertificateTrust` if the header has no usable `x5c` or the leaf
/// is not issued by a trusted authority.
pub fn verify_assertion_chain(
    assertion: &str,
    validator: &CertificateChainValidator,
) -> AuthResult<ValidatedCertificate> {
    let header = jose::decode_header(assertion).map_err(AuthError::certificate_trust)?;
    let x5c = jose::x5c(&header).map_err(AuthError::certificate_trust)?;
    validator.validate_chain(x5c)
}

/// Step e: verifies the RS256 signature with the leaf key and requires `aud`
/// to equal `request_url` exactly.
///
/// # Errors
///
/// Returns `TokenClaims` if the signature, audience or temporal claims are
/// invalid or `exp`, `iat` or `aud` is missing.
pub fn verify_assertion_signature(
    assertion: &str,
    leaf: &ValidatedCertificate,
    request_url: &str,
) -> AuthResult<Map<String, Value>> {
    let (_, key) = leaf.decoding_key()?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[request_url]);
    validation.set_required_spec_claims(&["exp", "aud"]);

    let data = jsonwebtoken::decode::<Map<String, Value>>(assertion, &key, &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, request_url = %request_url, "Client assertion rejected");
            AuthError::token_claims(format!("client assertion: {e}"))
        })?;

    if data.claims.get("iat").is_none_or(Value::is_null) {
        return Err(AuthError::token_claims("client assertion is missing iat"));
    }
    Ok(data.claims)
}

/// Step f: extracts the replay key.
///
/// # Errors
///
/// Returns `TokenClaims` unless `jti` is a non-empty string and `exp` an
/// integer.
pub fn replay_claims(claims: &Map<String, Value>) -> AuthResult<(&str, i64)> {
    let jti = claims
        .get("jti")
        .and_then(Value::as_str)
        .filter(|jti| !jti.is_empty())
        .ok_or_else(|| AuthError::token_claims("jti must be a non-empty string"))?;
    let exp = claims
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or_else(|| AuthError::token_claims("exp must be an integer"))?;
    Ok((jti, exp))
}

/// Step g: the assertion must be bound to the transport certificate.
///
/// # Errors
///
/// Returns `ProofOfPossession` if `cnf.x5t#S256` is missing or differs
/// from `fingerprint`.
pub fn check_confirmation(claims: &Map<String, Value>, fingerprint: &str) -> AuthResult<()> {
    let bound = claims
        .get("cnf")
        .and_then(|cnf| cnf.get("x5t#S256"))
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::proof_of_possession("cnf.x5t#S256 claim is missing"))?;

    if bound != fingerprint {
        return Err(AuthError::proof_of_possession(
            "cnf.x5t#S256 does not match the client certificate",
        ));
    }
    Ok(())
}

/// Returns the assertion subject, used as the owner identity of issued tokens.
///
/// # Errors
///
/// Returns `TokenClaims` if `sub` is missing or empty.
pub fn subject(claims: &Map<String, Value>) -> AuthResult<&str> {
    claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| AuthError::token_claims("sub must be a non-empty string"))
}
