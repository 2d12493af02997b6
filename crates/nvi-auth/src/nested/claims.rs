//! Claim sets of the outer and embedded assertions.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

/// Outer claims that must be present besides the registered JWT claims.
pub const REQUIRED_OUTER_CLAIMS: [&str; 2] = ["case_id", "embedded_token"];

/// Embedded claims that must be present.
pub const REQUIRED_EMBEDDED_CLAIMS: [&str; 5] = ["iss", "sub", "loa_authn", "loa_dezi", "relations"];

/// Fields every `relations` item must carry.
pub const REQUIRED_RELATION_FIELDS: [&str; 3] = ["entity_name", "roles", "identity_number"];

/// One organization relationship asserted by the embedded token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Display name of the organization.
    pub entity_name: String,

    /// Role codes held within the organization.
    pub roles: Vec<String>,

    /// Organization identity number (URA). Issuers that encode it as a JSON
    /// integer are accepted; the decimal text is kept.
    #[serde(deserialize_with = "identity_number")]
    pub identity_number: String,
}

fn identity_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) if n.is_u64() => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "identity_number must be a string or an unsigned integer, got {other}"
        ))),
    }
}

/// Claims of the embedded (DEZI) assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedClaims {
    pub iss: String,
    pub sub: String,
    /// Level of assurance of the authentication.
    pub loa_authn: Value,
    /// Level of assurance of the DEZI registration.
    pub loa_dezi: Value,
    pub relations: Vec<Relation>,
}

impl EmbeddedClaims {
    /// Returns the first relation whose identity number equals `identity`.
    #[must_use]
    pub fn relation_for(&self, identity: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.identity_number == identity)
    }

    /// All asserted identity numbers, in token order.
    #[must_use]
    pub fn identity_numbers(&self) -> Vec<&str> {
        self.relations
            .iter()
            .map(|r| r.identity_number.as_str())
            .collect()
    }
}

/// Result of a successful nested validation.
#[derive(Debug, Clone)]
pub struct VerifiedOuterClaims {
    /// The outer claims exactly as signed.
    pub claims: Map<String, Value>,

    /// The embedded claims.
    pub embedded: EmbeddedClaims,

    /// The relation that matched the caller.
    pub matched_relation: Relation,
}

impl VerifiedOuterClaims {
    /// The domain case identifier.
    #[must_use]
    pub fn case_id(&self) -> Option<&Value> {
        self.claims.get("case_id")
    }
}
