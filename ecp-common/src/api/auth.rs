//! Shared-secret verification for inbound callbacks
//!
//! Callers present a secret in a request header. Both sides are hashed with
//! SHA-256 first and the equal-length digests are compared with
//! [`subtle::ConstantTimeEq`], so timing does not depend on where the inputs
//! differ or on their lengths.
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies; header extraction lives in the service.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compare a provided secret with the expected one in constant time
///
/// An empty expected secret never matches, so an unset secret cannot be
/// satisfied by an empty header.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());

    a.as_slice().ct_eq(b.as_slice()).into()
}
