//! Password hashing on bcrypt with a fixed slow cost.
//!
//! Cost 12 is a security contract, not a tunable: the tens-of-milliseconds
//! hash time is what throttles online guessing. Callers in async context go
//! through [`crate::auth::AuthService`], which moves the work onto the
//! blocking pool.

use anyhow::{Context, Result};

/// Work factor for every stored hash.
pub const BCRYPT_COST: u32 = 12;

/// Hash a plaintext password. Each call salts independently, so two hashes
/// of the same password never compare equal as strings.
pub fn hash(plaintext: &str) -> Result<String> {
    bcrypt::hash(plaintext, BCRYPT_COST).context("failed to hash password")
}

/// Verify a plaintext against a stored hash.
///
/// A malformed or truncated hash verifies as `false` rather than erroring;
/// login treats it exactly like a wrong password.
#[must_use]
pub fn verify(plaintext: &str, stored_hash: &str) -> bool {
    bcrypt::verify(plaintext, stored_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_round_trip() {
        let hashed = hash("Passw0rd1").expect("hash");
        assert!(verify("Passw0rd1", &hashed));
        assert!(!verify("Passw0rd2", &hashed));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash("Passw0rd1").expect("hash");
        let second = hash("Passw0rd1").expect("hash");
        assert_ne!(first, second);
        assert!(verify("Passw0rd1", &second));
    }

    #[test]
    fn hash_embeds_cost_factor() {
        let hashed = hash("Passw0rd1").expect("hash");
        assert!(hashed.contains("$12$"), "unexpected hash format: {hashed}");
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify("anything", "not-a-bcrypt-hash"));
        assert!(!verify("anything", ""));
    }
}
