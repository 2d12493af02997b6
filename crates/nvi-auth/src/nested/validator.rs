//! Nested identity assertion validation.
//!
//! # Validation steps
//!
//! 1. The outer `x5c` chain must be issued by a trusted authority, and the
//!    leaf key must be RSA, EC, Ed25519 or Ed448.
//! 2. The outer token is verified as RS256 with `exp`, `iat`, `nbf` and `aud`.
//! 3. `case_id` and `embedded_token` must be present.
//! 4. The embedded signer is located through the signer registry: indexed by
//!    the header `x5t#S256` when present, otherwise by scanning. A `kid` or
//!    SHA-1 `x5t` alone selects the scan.
//! 5. The embedded claims must carry `iss`, `sub`, `loa_authn`, `loa_dezi`
//!    and a non-empty `relations` array.
//! 6. One relation must carry the caller's identity number.
//!
//! The embedded token is checked for its signature only. Its audience and
//! expiry are not enforced because the outer party cannot judge the intended
//! audience of the embedded token. Changing this requires a security review.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::claims::{
    EmbeddedClaims, REQUIRED_EMBEDDED_CLAIMS, REQUIRED_OUTER_CLAIMS, REQUIRED_RELATION_FIELDS,
    VerifiedOuterClaims,
};
use crate::AuthResult;
use crate::certificate::{
    CertificateChainValidator, SigningCertificateRegistry, TrustStore,
};
use crate::config::NestedTokenConfig;
use crate::error::AuthError;
use crate::jose;

/// Validates outer identity assertions and their embedded assertion.
#[derive(Debug, Clone)]
pub struct NestedTokenValidator {
    chain_validator: CertificateChainValidator,
    registry: Arc<SigningCertificateRegistry>,
    audience: String,
    leeway: u64,
}

impl NestedTokenValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(
        chain_validator: CertificateChainValidator,
        registry: Arc<SigningCertificateRegistry>,
        audience: impl Into<String>,
        leeway: u64,
    ) -> Self {
        Self {
            chain_validator,
            registry,
            audience: audience.into(),
            leeway,
        }
    }

    /// Loads the trust anchors named in `config`.
    ///
    /// Returns `None` when nested validation is not configured.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a trust anchor cannot be loaded.
    pub fn from_config(config: &NestedTokenConfig) -> AuthResult<Option<Self>> {
        let (Some(ca_bundle), Some(signers_dir)) =
            (&config.ca_bundle, &config.signing_certificates_dir)
        else {
            return Ok(None);
        };

        let trust_store = Arc::new(TrustStore::load(ca_bundle)?);
        let registry = Arc::new(SigningCertificateRegistry::load_dir(signers_dir)?);
        Ok(Some(Self::new(
            CertificateChainValidator::new(trust_store),
            registry,
            config.audience.clone(),
            config.leeway_seconds,
        )))
    }

    /// Validates `outer_token` for a caller whose identity number was
    /// established independently.
    ///
    /// # Errors
    ///
    /// Every failure is a `NestedTokenValidation` error describing the step
    /// that failed.
    pub fn validate(
        &self,
        outer_token: &str,
        caller_identity: &str,
    ) -> AuthResult<VerifiedOuterClaims> {
        self.validate_inner(outer_token, caller_identity)
            .inspect_err(|e| tracing::warn!(error = %e, "Nested token rejected"))
            .map_err(|e| match e {
                AuthError::NestedTokenValidation { .. } => e,
                other => AuthError::nested_token(other.to_string()),
            })
    }

    fn validate_inner(
        &self,
        outer_token: &str,
        caller_identity: &str,
    ) -> AuthResult<VerifiedOuterClaims> {
        let claims = self.verify_outer(outer_token)?;

        require_claims(&claims, &REQUIRED_OUTER_CLAIMS, "outer token")?;
        let embedded_token = claims
            .get("embedded_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::nested_token("embedded_token must be a string"))?;

        let embedded = self.verify_embedded(embedded_token)?;

        let matched_relation = embedded
            .relation_for(caller_identity)
            .cloned()
            .ok_or_else(|| {
                AuthError::nested_token(format!(
                    "no relation matches identity number '{caller_identity}' (available: [{}])",
                    embedded.identity_numbers().join(", ")
                ))
            })?;

        tracing::debug!(
            identity_number = %caller_identity,
            entity_name = %matched_relation.entity_name,
            "Nested token validated"
        );
        Ok(VerifiedOuterClaims {
            claims,
            embedded,
            matched_relation,
        })
    }

    /// Steps 1 and 2: chain, key type and full RS256 verification.
    fn verify_outer(&self, token: &str) -> AuthResult<Map<String, Value>> {
        let header = jose::decode_header(token).map_err(AuthError::nested_token)?;
        let x5c = jose::x5c(&header).map_err(AuthError::nested_token)?;

        let leaf = self.chain_validator.validate_chain(x5c)?;
        let (key_type, key) = leaf.decoding_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iat", "nbf", "aud"]);

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation)
            .map_err(|e| {
                AuthError::nested_token(format!(
                    "outer token verification failed ({key_type} key): {e}"
                ))
            })?;

        let iat = data
            .claims
            .get("iat")
            .and_then(Value::as_i64)
            .ok_or_else(|| AuthError::nested_token("iat must be an integer"))?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if iat > now + self.leeway as i64 {
            return Err(AuthError::nested_token("outer token iat is in the future"));
        }

        Ok(data.claims)
    }

    /// Steps 4 and 5: locate the signer and check the embedded claim set.
    fn verify_embedded(&self, token: &str) -> AuthResult<EmbeddedClaims> {
        let header = jose::decode_header(token)
            .map_err(|e| AuthError::nested_token(format!("embedded token: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims::<&str>(&[]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let (data, lookup) = self
            .registry
            .verify::<Map<String, Value>>(token, jose::thumbprint_hint(&header), &validation)
            .map_err(|e| AuthError::nested_token(format!("embedded token: {e}")))?;
        tracing::debug!(?lookup, "Embedded token signer located");

        let claims = data.claims;
        require_claims(&claims, &REQUIRED_EMBEDDED_CLAIMS, "embedded token")?;

        let relations = claims
            .get("relations")
            .and_then(Value::as_array)
            .ok_or_else(|| AuthError::nested_token("relations must be an array"))?;
        if relations.is_empty() {
            return Err(AuthError::nested_token("relations must not be empty"));
        }
        for (index, relation) in relations.iter().enumerate() {
            let relation = relation.as_object().ok_or_else(|| {
                AuthError::nested_token(format!("relations[{index}] must be an object"))
            })?;
            require_claims(relation, &REQUIRED_RELATION_FIELDS, &format!("relations[{index}]"))?;
        }

        serde_json::from_value(Value::Object(claims))
            .map_err(|e| AuthError::nested_token(format!("embedded token claims: {e}")))
    }
}

fn require_claims(claims: &Map<String, Value>, required: &[&str], context: &str) -> AuthResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| claims.get(*name).is_none_or(Value::is_null))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::nested_token(format!(
            "{context} is missing required claims: {}",
            missing.join(", ")
        )))
    }
}
