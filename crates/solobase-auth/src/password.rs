//! Argon2id password hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{AuthError, AuthResult};

/// Hash a plaintext password with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] if the underlying hasher fails, which in
/// practice only happens on an unsupported parameter combination.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored Argon2 hash.
///
/// Verification failure (wrong password) and a malformed stored hash are
/// both reported as [`AuthError::InvalidCredentials`]; argon2's own
/// comparison is constant-time, so this never short-circuits on the first
/// differing byte.
pub fn verify_password(password: &str, stored_hash: &str) -> AuthResult<()> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_round_trip_a_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        verify_password("correct horse battery staple", &hash).unwrap();
    }

    #[test]
    fn test_should_reject_wrong_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        let err = verify_password("wrong password", &hash).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_should_produce_distinct_hashes_for_same_password() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b, "salts must be random per hash");
    }

    #[test]
    fn test_should_reject_malformed_stored_hash() {
        let err = verify_password("anything", "not-a-hash").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
