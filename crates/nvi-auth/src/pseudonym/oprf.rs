//! Unblind step of the oblivious pseudo-random function.
//!
//! The primitive itself lives outside this crate. The exchanger only shapes
//! its inputs and outputs.

/// Removes the caller's blind from an OPRF evaluation.
///
/// For a given `(blinded, blind_factor)` the output must always be the same
/// bytes; pseudonym lookups depend on exact equality.
pub trait OprfUnblinder: Send + Sync {
    /// Combines the blinded evaluation with the caller's blind factor.
    fn unblind(&self, blinded: &[u8], blind_factor: &[u8]) -> Result<Vec<u8>, String>;
}
